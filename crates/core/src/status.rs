//! Status enums mapping to SMALLINT lookup tables, plus the transition
//! rules built on them.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table. For
//! [`DeliveryStatus`] the discriminant doubles as a monotonic progress
//! rank (`pending < sent < delivered < read`), which is what makes the
//! forward-only webhook rule a single integer comparison both here and in
//! SQL.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Resolve a database status ID back to the enum.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Delivery lifecycle of a single notification attempt.
    ///
    /// Ordered by progress: a log only ever moves to a higher rank, except
    /// for `Failed` which is reachable from `Pending`/`Sent` and terminal
    /// until an explicit retry resets the row to `Pending`.
    DeliveryStatus {
        Pending = 1,
        Sent = 2,
        Delivered = 3,
        Read = 4,
        Failed = 5,
    }
}

define_status_enum! {
    /// Campaign lifecycle status.
    CampaignStatus {
        Draft = 1,
        Scheduled = 2,
        Executing = 3,
        Paused = 4,
        Completed = 5,
        Cancelled = 6,
    }
}

impl DeliveryStatus {
    /// Canonical column/wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Read => "read",
            DeliveryStatus::Failed => "failed",
        }
    }

    /// Map a provider-reported status to the canonical vocabulary.
    ///
    /// Providers use their own terms for the same milestones: email
    /// `opened` is our `read`, email `bounced` is our `failed`. Returns
    /// `None` for vocabulary we do not recognise (the caller rejects the
    /// payload rather than guessing).
    pub fn from_provider(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(DeliveryStatus::Pending),
            "sent" => Some(DeliveryStatus::Sent),
            "delivered" => Some(DeliveryStatus::Delivered),
            "read" | "opened" => Some(DeliveryStatus::Read),
            "failed" | "bounced" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }

    /// Progress rank. Higher rank = further along the delivery pipeline.
    /// `Failed` sits outside the rank ladder and is handled by
    /// [`allowed_sources`](Self::allowed_sources).
    pub fn rank(self) -> i16 {
        self.id()
    }

    /// The statuses a log may be in for a transition *to* `self` to apply.
    ///
    /// Encodes the whole state machine in one table:
    /// - progress statuses accept any strictly lower rank (never `Failed`),
    /// - `Failed` is reachable from `Pending` or `Sent` only,
    /// - nothing transitions to `Pending` except an explicit retry, which
    ///   goes through its own attempt-count path, not this table.
    pub fn allowed_sources(self) -> &'static [DeliveryStatus] {
        match self {
            DeliveryStatus::Pending => &[],
            DeliveryStatus::Sent => &[DeliveryStatus::Pending],
            DeliveryStatus::Delivered => &[DeliveryStatus::Pending, DeliveryStatus::Sent],
            DeliveryStatus::Read => &[
                DeliveryStatus::Pending,
                DeliveryStatus::Sent,
                DeliveryStatus::Delivered,
            ],
            DeliveryStatus::Failed => &[DeliveryStatus::Pending, DeliveryStatus::Sent],
        }
    }

    /// Whether a log currently at `from` may move to `self`.
    ///
    /// Replaying the same webhook is therefore a no-op: after the first
    /// application `from == self`, which is never an allowed source.
    pub fn can_transition_from(self, from: DeliveryStatus) -> bool {
        self.allowed_sources().contains(&from)
    }
}

impl CampaignStatus {
    /// Canonical column/wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Executing => "executing",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }

    /// Execution may start only from `Draft` or `Scheduled`.
    pub fn can_execute(self) -> bool {
        matches!(self, CampaignStatus::Draft | CampaignStatus::Scheduled)
    }

    /// Pausing is only meaningful while the dispatch loop is running.
    pub fn can_pause(self) -> bool {
        self == CampaignStatus::Executing
    }

    /// Resuming is the inverse of pause.
    pub fn can_resume(self) -> bool {
        self == CampaignStatus::Paused
    }

    /// `Completed` and `Cancelled` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Cancelled)
    }

    /// Any non-terminal campaign may be cancelled.
    pub fn can_cancel(self) -> bool {
        !self.is_terminal()
    }
}
