//! Request dispatch and per-kind handlers.
//!
//! Dispatch is an exhaustive match on [`EscRequest`]: adding a request kind
//! does not compile until it has a handler here.

use powertrain_proto::{
    EscRequest, EscResponse, ErrorResponse, ExchangeStateRequest, ExchangeStateResponse,
    MessageKind,
};
use tracing::{debug, warn};

use super::{CyclePhase, ExchangeLoop, UnknownKindPolicy};
use crate::{
    codec::MessageCodec, error::ExchangeError, processor::ExchangeProcessor,
    transport::FrameTransport,
};

impl<T, C, P> ExchangeLoop<T, C, P>
where
    T: FrameTransport,
    C: MessageCodec,
    P: ExchangeProcessor,
{
    /// Route a decoded request to its handler.
    ///
    /// Errors only for an unknown kind under [`UnknownKindPolicy::Ignore`].
    pub(super) fn dispatch(&mut self, request: EscRequest) -> Result<EscResponse, ExchangeError> {
        match request {
            EscRequest::ExchangeState(request) => Ok(self.handle_exchange_state(&request)),
            EscRequest::Unknown { kind } => {
                self.stats.unknown_kinds += 1;
                warn!(kind, policy = ?self.config.unknown_kind_policy, "unknown request kind");

                match self.config.unknown_kind_policy {
                    UnknownKindPolicy::Reject => {
                        Ok(EscResponse::Error(ErrorResponse::unknown_request_kind(kind)))
                    },
                    UnknownKindPolicy::Ignore => Err(ExchangeError::UnknownRequestKind { kind }),
                }
            },
        }
    }

    /// Validate and apply the command (if any), then report measured state.
    ///
    /// An invalid command is refused as a whole: nothing reaches the
    /// processor and the ESC gets an error response instead of state.
    fn handle_exchange_state(&mut self, request: &ExchangeStateRequest) -> EscResponse {
        self.enter(CyclePhase::Processing);

        if let Some(command) = &request.command
            && let Err(err) = command.validate()
        {
            self.stats.rejected_commands += 1;
            warn!(sequence = request.sequence, error = %err, "rejecting command");
            return EscResponse::Error(ErrorResponse::invalid_command(
                MessageKind::ExchangeState.to_u16(),
                err.to_string(),
            ));
        }

        let admitted = self.monitor.admit_command();
        match (&request.command, admitted) {
            (Some(command), true) => {
                self.processor.apply_command(command);
                self.stats.applied_commands += 1;
            },
            (Some(_), false) => {
                debug!(sequence = request.sequence, "fail-safe engaged, holding safe state");
            },
            (None, _) => {},
        }

        EscResponse::ExchangeState(ExchangeStateResponse {
            sequence: request.sequence,
            state: self.processor.read_state(),
            fail_safe: self.monitor.is_engaged(),
        })
    }
}
