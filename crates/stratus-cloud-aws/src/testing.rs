//! In-memory EC2 used by the driver tests

use crate::ec2::{Ec2Address, Ec2Api};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    addresses: HashMap<String, Ec2Address>,
    /// Mutation not yet visible to describe, with the describes left to hide it
    pending: Option<(Ec2Address, u32)>,
    lag: u32,
    calls: HashMap<&'static str, usize>,
    next_association: u32,
}

/// Fake [`Ec2Api`] counting every call
#[derive(Default)]
pub struct FakeEc2 {
    state: Mutex<State>,
}

impl FakeEc2 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_address(&self, allocation_id: &str, public_ip: &str, instance_id: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.next_association += 1;
        let association_id = instance_id.map(|_| format!("eipassoc-{}", state.next_association));
        state.addresses.insert(
            allocation_id.to_string(),
            Ec2Address {
                allocation_id: Some(allocation_id.to_string()),
                association_id,
                domain: Some("vpc".to_string()),
                instance_id: instance_id.map(str::to_string),
                public_ip: Some(public_ip.to_string()),
                ..Default::default()
            },
        );
    }

    /// Insert an address exactly as EC2 would describe it
    pub fn add_raw(&self, addr: Ec2Address) {
        let id = addr.allocation_id.clone().unwrap_or_default();
        self.state.lock().unwrap().addresses.insert(id, addr);
    }

    /// Rebind an address immediately, bypassing the call counters
    pub fn bind(&self, allocation_id: &str, instance_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.next_association += 1;
        let association_id = format!("eipassoc-{}", state.next_association);
        if let Some(addr) = state.addresses.get_mut(allocation_id) {
            addr.instance_id = Some(instance_id.to_string());
            addr.association_id = Some(association_id);
        }
    }

    /// Number of describes a mutation stays invisible for
    pub fn set_lag(&self, lag: u32) {
        self.state.lock().unwrap().lag = lag;
    }

    pub fn calls(&self, op: &str) -> usize {
        self.state.lock().unwrap().calls.get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    fn record(state: &mut State, op: &'static str) {
        *state.calls.entry(op).or_default() += 1;
    }

    fn stage(state: &mut State, addr: Ec2Address) {
        if state.lag == 0 {
            let id = addr.allocation_id.clone().unwrap_or_default();
            state.addresses.insert(id, addr);
        } else {
            state.pending = Some((addr, state.lag));
        }
    }
}

#[async_trait]
impl Ec2Api for FakeEc2 {
    async fn describe_addresses(&self, allocation_id: Option<&str>) -> Result<Vec<Ec2Address>> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, "describe");

        match state.pending.take() {
            Some((addr, 0)) => {
                let id = addr.allocation_id.clone().unwrap_or_default();
                state.addresses.insert(id, addr);
            }
            Some((addr, left)) => state.pending = Some((addr, left - 1)),
            None => {}
        }

        match allocation_id {
            Some(id) => state
                .addresses
                .get(id)
                .cloned()
                .map(|a| vec![a])
                .ok_or_else(|| AwsError::EipNotFound(id.to_string())),
            None => Ok(state.addresses.values().cloned().collect()),
        }
    }

    async fn allocate_address(&self, domain: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, "allocate");

        let id = format!("eipalloc-{}", state.addresses.len() + 100);
        let ip = format!("198.51.100.{}", state.addresses.len() + 1);
        state.addresses.insert(
            id.clone(),
            Ec2Address {
                allocation_id: Some(id.clone()),
                domain: Some(domain.to_string()),
                public_ip: Some(ip),
                ..Default::default()
            },
        );
        Ok(id)
    }

    async fn release_address(&self, allocation_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, "release");
        state
            .addresses
            .remove(allocation_id)
            .map(|_| ())
            .ok_or_else(|| AwsError::EipNotFound(allocation_id.to_string()))
    }

    async fn associate_address(&self, allocation_id: &str, instance_id: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, "associate");

        state.next_association += 1;
        let association_id = format!("eipassoc-{}", state.next_association);
        let mut addr = state
            .addresses
            .get(allocation_id)
            .cloned()
            .ok_or_else(|| AwsError::EipNotFound(allocation_id.to_string()))?;
        addr.instance_id = Some(instance_id.to_string());
        addr.association_id = Some(association_id.clone());
        Self::stage(&mut state, addr);
        Ok(association_id)
    }

    async fn disassociate_address(&self, association_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, "disassociate");

        let mut addr = state
            .addresses
            .values()
            .find(|a| a.association_id.as_deref() == Some(association_id))
            .cloned()
            .ok_or_else(|| AwsError::Api {
                operation: "DisassociateAddress".to_string(),
                message: format!("unknown association {association_id}"),
            })?;
        addr.instance_id = None;
        addr.association_id = None;
        Self::stage(&mut state, addr);
        Ok(())
    }
}
