//! Usage persistence seam
//!
//! Cloud calls that produce tokens submit exactly one usage record.
//! The sink is a trait so the router can be exercised in tests without an
//! admin backend.

use std::sync::Arc;

use hearth_core::UsageRecord;
use hearth_config::AdminClient;

/// Destination for append-only usage records. Submission is
/// fire-and-forget; implementations must not block the caller.
pub trait UsageSink: Send + Sync {
    fn submit(&self, record: UsageRecord);
}

/// Production sink: POSTs to the admin backend.
pub struct AdminUsageSink {
    admin: Arc<AdminClient>,
}

impl AdminUsageSink {
    pub fn new(admin: Arc<AdminClient>) -> Self {
        Self { admin }
    }
}

impl UsageSink for AdminUsageSink {
    fn submit(&self, record: UsageRecord) {
        self.admin.submit_usage(record);
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Test sink that records every submission.
    #[derive(Default)]
    pub struct RecordingSink {
        pub records: Mutex<Vec<UsageRecord>>,
    }

    impl UsageSink for RecordingSink {
        fn submit(&self, record: UsageRecord) {
            self.records.lock().push(record);
        }
    }
}
