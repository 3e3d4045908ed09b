//! Inbound message handling: classify each patient message and answer it
//! through the assistant, the help path, or a canned reply.

pub mod dispatcher;
pub mod help;
pub mod locks;
pub mod processor;

pub use dispatcher::{DispatcherClosed, InboundDispatcher};
pub use help::{is_help_request, Escalation, HelpEscalation, HELP_KEYWORDS};
pub use locks::PatientLocks;
pub use processor::{Outcome, ProcessingError, ProcessorConfig, WebhookProcessor};

/// Fixed texts sent to patients
pub mod replies {
    pub const UNKNOWN_SENDER: &str = "Thank you for your message. We couldn't find your patient record. Please contact your healthcare provider directly.";
    pub const ALREADY_COMPLETE: &str =
        "This follow-up is already complete. If you need help, reply with 'HELP'.";
    pub const HELP_ACKNOWLEDGED: &str =
        "We've received your help request. A healthcare professional will reach out shortly.";
    pub const HELP_FALLBACK: &str = "I understand you need help. Please contact your healthcare provider directly for immediate assistance.";
    pub const PROCESSING_FALLBACK: &str = "I'm having trouble processing your message right now. Please try again later or contact your healthcare provider directly.";
}
