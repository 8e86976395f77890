use vigil_types::message::MessagePublication;

use crate::error::AccountantError;

/// External bookkeeping that sees every message before it is signed.
///
/// `Ok(false)` holds the message back, exactly like a governor queueing
/// decision. Held messages come back later through the processor's
/// accountant-release channel. An `Err` stops the processor.
pub trait Accountant: Send {
    fn submit_observation(&self, msg: &MessagePublication) -> Result<bool, AccountantError>;

    fn close(&self);
}
