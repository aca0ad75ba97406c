//! Bookkeeping the runtime keeps for one attached ability.

use crate::handler::Handler;
use ability_core::{AbilityImpl, AbilityInfo, Token};

pub struct AbilityLocalRecord {
    info: AbilityInfo,
    token: Token,
    handler: Handler<AbilityImpl>,
}

impl AbilityLocalRecord {
    pub fn new(info: AbilityInfo, token: Token, handler: Handler<AbilityImpl>) -> Self {
        Self {
            info,
            token,
            handler,
        }
    }

    pub fn info(&self) -> &AbilityInfo {
        &self.info
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn handler(&self) -> &Handler<AbilityImpl> {
        &self.handler
    }
}
