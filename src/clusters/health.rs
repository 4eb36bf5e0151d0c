//! gRPC health checks for backend clusters.

use std::time::Duration;

use crate::clusters::descriptor::{ClusterDescriptor, GrpcHealthCheck, HealthCheck};
use crate::config::DeploymentOptions;

const HEALTHY_THRESHOLD: u32 = 3;
const UNHEALTHY_THRESHOLD: u32 = 3;

/// gRPC health-check tuning, present only when the option is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct GrpcHealth {
    pub service_name: String,
    pub interval: Duration,
    pub no_traffic_interval: Duration,
}

impl GrpcHealth {
    pub fn from_options(opts: &DeploymentOptions) -> Option<Self> {
        if !opts.health_check_grpc_backend {
            return None;
        }
        Some(Self {
            service_name: opts.health_check_grpc_backend_service.clone(),
            interval: opts.health_check_interval(),
            no_traffic_interval: opts.health_check_no_traffic_interval(),
        })
    }

    pub fn health_check(&self) -> HealthCheck {
        HealthCheck {
            // The interval doubles as the per-probe timeout.
            timeout: self.interval,
            interval: self.interval,
            no_traffic_interval: self.no_traffic_interval,
            unhealthy_threshold: UNHEALTHY_THRESHOLD,
            healthy_threshold: HEALTHY_THRESHOLD,
            grpc_health_check: GrpcHealthCheck { service_name: self.service_name.clone() },
        }
    }

    pub fn apply(&self, cluster: &mut ClusterDescriptor) {
        cluster.health_checks = vec![self.health_check()];
    }
}
