//! Registries owning the host and container inventories.
//!
//! All fleet mutations go through these types. Every operation validates
//! before applying, so a failed call leaves the registries unchanged.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use thiserror::Error;
use crate::container::{Container, ContainerState, ResourceReservation};
use crate::host::{Host, HostMetrics, HostState};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("host {host} cannot fit container {container} within its remaining capacity")]
    CapacityExceeded { host: u32, container: u64 },
    #[error("host {host} is powered off")]
    HostUnavailable { host: u32 },
    #[error("host {host} still holds {containers} container(s)")]
    NonEmptyShutdown { host: u32, containers: usize },
    #[error("unknown host {host}")]
    UnknownHost { host: u32 },
    #[error("unknown container {container}")]
    UnknownContainer { container: u64 },
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum PlacementError {
    #[error("no host can currently accommodate the container")]
    NoCapacityAvailable,
}

/// Sole owner of host entities, keyed by host id for deterministic iteration.
#[derive(Default)]
pub struct HostRegistry {
    hosts: BTreeMap<u32, Rc<RefCell<Host>>>,
}

impl HostRegistry {
    pub fn add_host(&mut self, host: Rc<RefCell<Host>>) {
        let host_id = host.borrow().id;
        self.hosts.insert(host_id, host);
    }

    pub fn host(&self, host_id: u32) -> Option<Rc<RefCell<Host>>> {
        self.hosts.get(&host_id).cloned()
    }

    pub fn hosts(&self) -> &BTreeMap<u32, Rc<RefCell<Host>>> {
        &self.hosts
    }

    pub fn contains(&self, host_id: u32) -> bool {
        self.hosts.contains_key(&host_id)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Replace the observed reading of a host.
    pub fn upsert_metrics(&mut self, host_id: u32, metrics: HostMetrics) -> Result<(), RegistryError> {
        let host = self.hosts.get(&host_id).ok_or(RegistryError::UnknownHost { host: host_id })?;
        host.borrow_mut().metrics = metrics;
        Ok(())
    }

    /// Apply a host state transition. Moving an occupied host to Shutdown
    /// is rejected.
    pub fn set_state(&mut self, host_id: u32, state: HostState) -> Result<(), RegistryError> {
        let host = self.hosts.get(&host_id).ok_or(RegistryError::UnknownHost { host: host_id })?;
        let mut host = host.borrow_mut();
        if state == HostState::Shutdown {
            if !host.containers.is_empty() {
                return Err(RegistryError::NonEmptyShutdown {
                    host: host_id,
                    containers: host.containers.len(),
                });
            }
            host.cpu_reserved = 0.0;
            host.memory_reserved = 0.0;
            host.metrics.power_watts = 0.0;
        }
        host.state = state;
        Ok(())
    }

    /// Book a container's reservation on a host.
    pub fn bind(&mut self, host_id: u32, container_id: u64,
                reservation: &ResourceReservation) -> Result<(), RegistryError> {
        let host = self.hosts.get(&host_id).ok_or(RegistryError::UnknownHost { host: host_id })?;
        let mut host = host.borrow_mut();
        if !host.is_powered() {
            return Err(RegistryError::HostUnavailable { host: host_id });
        }
        if host.cpu_free() < reservation.cpu || host.memory_free() < reservation.memory {
            return Err(RegistryError::CapacityExceeded { host: host_id, container: container_id });
        }
        host.cpu_reserved += reservation.cpu;
        host.memory_reserved += reservation.memory;
        host.containers.insert(container_id);
        Ok(())
    }

    /// Return a container's reservation to the host.
    pub fn release(&mut self, host_id: u32, container_id: u64,
                   reservation: &ResourceReservation) -> Result<(), RegistryError> {
        let host = self.hosts.get(&host_id).ok_or(RegistryError::UnknownHost { host: host_id })?;
        let mut host = host.borrow_mut();
        if !host.containers.remove(&container_id) {
            return Err(RegistryError::UnknownContainer { container: container_id });
        }
        host.cpu_reserved = (host.cpu_reserved - reservation.cpu).max(0.0);
        host.memory_reserved = (host.memory_reserved - reservation.memory).max(0.0);
        Ok(())
    }

    pub fn count_in_state(&self, state: HostState) -> usize {
        self.hosts.values().filter(|h| h.borrow().state == state).count()
    }

    /// Total observed power draw of the fleet in watts.
    pub fn total_power(&self) -> f64 {
        self.hosts.values()
            .filter(|h| h.borrow().is_powered())
            .map(|h| h.borrow().metrics.power_watts)
            .sum()
    }

    /// Highest full-load power rating across the fleet.
    pub fn max_power_rating(&self) -> f64 {
        self.hosts.values().map(|h| h.borrow().power_max).fold(0.0, f64::max)
    }

    /// Lower median of the observed latencies over active hosts.
    pub fn median_active_latency(&self) -> Option<f64> {
        let mut latencies: Vec<f64> = self.hosts.values()
            .filter(|h| h.borrow().state == HostState::Active)
            .map(|h| h.borrow().metrics.latency_ms)
            .collect();
        if latencies.is_empty() {
            return None;
        }
        let mid = (latencies.len() - 1) / 2;
        Some(*order_stat::kth_by(&mut latencies, mid, |a, b| a.total_cmp(b)))
    }

    pub fn mean_cpu_utilization(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0;
        for host in self.hosts.values() {
            let host = host.borrow();
            if host.is_powered() {
                sum += host.metrics.cpu_utilization;
                count += 1;
            }
        }
        if count == 0 { 0.0 } else { sum / count as f64 }
    }

    pub fn mean_memory_utilization(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0;
        for host in self.hosts.values() {
            let host = host.borrow();
            if host.is_powered() {
                sum += host.metrics.memory_utilization;
                count += 1;
            }
        }
        if count == 0 { 0.0 } else { sum / count as f64 }
    }
}

/// Sole owner of container entities.
#[derive(Default)]
pub struct ContainerRegistry {
    containers: BTreeMap<u64, Container>,
}

impl ContainerRegistry {
    pub fn insert(&mut self, container: Container) {
        self.containers.insert(container.id, container);
    }

    pub fn remove(&mut self, container_id: u64) -> Option<Container> {
        self.containers.remove(&container_id)
    }

    pub fn get(&self, container_id: u64) -> Option<&Container> {
        self.containers.get(&container_id)
    }

    pub fn get_mut(&mut self, container_id: u64) -> Option<&mut Container> {
        self.containers.get_mut(&container_id)
    }

    pub fn containers(&self) -> &BTreeMap<u64, Container> {
        &self.containers
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Container> {
        self.containers.values_mut()
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Record which host holds the container's reservation.
    pub fn assign(&mut self, container_id: u64, host_id: u32) -> Result<(), RegistryError> {
        let container = self.containers.get_mut(&container_id)
            .ok_or(RegistryError::UnknownContainer { container: container_id })?;
        container.host = Some(host_id);
        Ok(())
    }

    pub fn set_state(&mut self, container_id: u64, state: ContainerState) -> Result<(), RegistryError> {
        let container = self.containers.get_mut(&container_id)
            .ok_or(RegistryError::UnknownContainer { container: container_id })?;
        container.state = state;
        Ok(())
    }

    pub fn count_in_state(&self, state: ContainerState) -> usize {
        self.containers.values().filter(|c| c.state == state).count()
    }
}
