use tinkoff_balance::balance::BalanceRequest;

pub enum Action {
    Balance {
        request: BalanceRequest,
        json: bool,
    },
    Operations {
        request: BalanceRequest,
        json: bool,
    },
}
