use serde::Deserialize;

/// Business-policy knobs for the booking core, loaded from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingPolicy {
    /// Whether a refund may be recorded against a booking whose travel is
    /// already Completed. When true the refund is recorded and the booking
    /// keeps its Completed status; when false the refund event is rejected.
    #[serde(default = "default_allow_refund_after_completion")]
    pub allow_refund_after_completion: bool,

    /// Upper bound on travelers per booking request.
    #[serde(default = "default_max_travelers")]
    pub max_travelers_per_booking: u32,
}

fn default_allow_refund_after_completion() -> bool {
    true
}

fn default_max_travelers() -> u32 {
    20
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            allow_refund_after_completion: default_allow_refund_after_completion(),
            max_travelers_per_booking: default_max_travelers(),
        }
    }
}
