//! Standard simulation events.

// PLACEMENT EVENTS //
pub mod placement {
    use serde::Serialize;
    use crate::container::Container;
    use crate::placement_strategy::PlacementDecision;

    #[derive(Clone, Serialize)]
    pub struct ContainerSubmitted {
        pub container: Container,
    }

    #[derive(Clone, Serialize)]
    pub struct PlacementDecided {
        pub decision: PlacementDecision,
    }

    #[derive(Clone, Serialize)]
    pub struct PlacementFailed {
        pub container_id: u64,
        pub attempts: u64,
    }
}

// HOST AGENT EVENTS //
pub mod runtime {
    use serde::Serialize;

    #[derive(Clone, Serialize)]
    pub struct ContainerStartRequest {
        pub container_id: u64,
    }

    #[derive(Clone, Serialize)]
    pub struct ContainerStarted {
        pub container_id: u64,
        pub host_id: u32,
    }

    #[derive(Clone, Serialize)]
    pub struct ContainerStartFailed {
        pub container_id: u64,
        pub host_id: u32,
    }

    #[derive(Clone, Serialize)]
    pub struct ContainerStopRequest {
        pub container_id: u64,
    }

    #[derive(Clone, Serialize)]
    pub struct ContainerStopped {
        pub container_id: u64,
        pub host_id: u32,
    }
}

// HOST POWER EVENTS //
pub mod power {
    use serde::Serialize;
    use crate::host::HostState;

    #[derive(Clone, Serialize)]
    pub struct PowerOnRequest {
    }

    #[derive(Clone, Serialize)]
    pub struct PowerOffRequest {
    }

    #[derive(Clone, Serialize)]
    pub struct PowerStateChanged {
        pub host_id: u32,
        pub state: HostState,
    }

    #[derive(Clone, Serialize)]
    pub struct PowerOffFailed {
        pub host_id: u32,
        pub busy_containers: usize,
    }
}

// MONITORING EVENTS //
pub mod monitoring {
    use serde::Serialize;
    use crate::host::HostMetrics;

    #[derive(Clone, Serialize)]
    pub struct MonitoringCycle {
    }

    #[derive(Clone, Serialize)]
    pub struct HostMetricsReport {
        pub host_id: u32,
        pub metrics: HostMetrics,
    }
}

// CONSOLIDATION EVENTS //
pub mod consolidation {
    use serde::Serialize;
    use crate::consolidation_strategy::MigrationPlan;

    #[derive(Clone, Serialize)]
    pub struct ConsolidationCycle {
    }

    #[derive(Clone, Serialize)]
    pub struct ApplyMigrationPlan {
        pub plan: MigrationPlan,
    }
}

// SCHEDULER'S WORK EVENTS //
pub mod scheduling {
    use serde::Serialize;

    #[derive(Clone, Serialize)]
    pub struct SchedulingCycle {
    }

    #[derive(Clone, Serialize)]
    pub struct BacklogRetry {
        pub container_id: u64,
    }

    #[derive(Clone, Serialize)]
    pub struct MoveRequest {
    }
}

// EXTERNAL LIFECYCLE EVENTS //
pub mod lifecycle {
    use serde::Serialize;

    #[derive(Clone, Serialize)]
    pub struct TerminationRequest {
        pub container_id: u64,
    }
}

// REPORTING EVENTS //
pub mod reporting {
    use serde::Serialize;

    #[derive(Clone, Serialize)]
    pub struct MetricsSnapshot {
    }
}
