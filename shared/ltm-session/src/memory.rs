//! In-memory device
//!
//! Behaves like a real device for pool and member bookkeeping, counts every
//! call and can be told to fail specific operations. Used for dry runs and
//! tests.

use async_trait::async_trait;
use ltm_core::{LtmError, PoolMember, PoolName, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;
use tracing::debug;

use crate::session::{DeviceSession, Operation};

#[derive(Default)]
struct DeviceState {
    pools: BTreeMap<PoolName, BTreeSet<PoolMember>>,
    vservers: BTreeSet<String>,
    vteps: BTreeSet<Ipv4Addr>,
    calls: HashMap<Operation, usize>,
    faults: HashMap<Operation, LtmError>,
}

impl DeviceState {
    /// Count the call and return the injected fault for it, if any.
    fn record(&mut self, op: Operation) -> Result<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.faults.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Load-balancer device held entirely in memory
#[derive(Default)]
pub struct InMemoryDevice {
    state: Mutex<DeviceState>,
}

impl InMemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a pool with the given members.
    pub fn with_pool(self, pool: PoolName, members: impl IntoIterator<Item = PoolMember>) -> Self {
        self.state
            .lock()
            .pools
            .insert(pool, members.into_iter().collect());
        self
    }

    pub fn with_empty_pool(self, pool: PoolName) -> Self {
        self.with_pool(pool, Vec::<PoolMember>::new())
    }

    pub fn with_vserver(self, vserver: impl Into<String>) -> Self {
        self.state.lock().vservers.insert(vserver.into());
        self
    }

    /// Make every subsequent call to `op` fail with `err`.
    pub fn fail(&self, op: Operation, err: LtmError) {
        self.state.lock().faults.insert(op, err);
    }

    pub fn clear_fault(&self, op: Operation) {
        self.state.lock().faults.remove(&op);
    }

    /// Number of times `op` has been called, failed calls included.
    pub fn calls(&self, op: Operation) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn mutation_calls(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|(op, _)| op.is_mutation())
            .map(|(_, n)| n)
            .sum()
    }

    pub fn reset_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn has_pool(&self, pool: &PoolName) -> bool {
        self.state.lock().pools.contains_key(pool)
    }

    pub fn pool_names(&self) -> Vec<PoolName> {
        self.state.lock().pools.keys().cloned().collect()
    }

    pub fn members(&self, pool: &PoolName) -> Vec<PoolMember> {
        self.state
            .lock()
            .pools
            .get(pool)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Add a member behind the router's back, as another consumer would.
    pub fn insert_member(&self, pool: &PoolName, member: PoolMember) {
        if let Some(members) = self.state.lock().pools.get_mut(pool) {
            members.insert(member);
        }
    }

    pub fn vteps(&self) -> Vec<Ipv4Addr> {
        self.state.lock().vteps.iter().copied().collect()
    }
}

#[async_trait]
impl DeviceSession for InMemoryDevice {
    async fn initialize(&self) -> Result<()> {
        self.state.lock().record(Operation::Initialize)?;
        debug!("In-memory device initialized");
        Ok(())
    }

    async fn pool_exists(&self, pool: &PoolName) -> Result<bool> {
        let mut state = self.state.lock();
        state.record(Operation::PoolExists)?;
        Ok(state.pools.contains_key(pool))
    }

    async fn create_pool(&self, pool: &PoolName) -> Result<()> {
        let mut state = self.state.lock();
        state.record(Operation::CreatePool)?;
        if state.pools.contains_key(pool) {
            return Err(LtmError::device(409, format!("pool {} already exists", pool)));
        }
        state.pools.insert(pool.clone(), BTreeSet::new());
        Ok(())
    }

    async fn delete_pool(&self, pool: &PoolName) -> Result<()> {
        let mut state = self.state.lock();
        state.record(Operation::DeletePool)?;
        state
            .pools
            .remove(pool)
            .map(|_| ())
            .ok_or_else(|| LtmError::NotFound(format!("pool {}", pool)))
    }

    async fn get_pool_members(&self, pool: &PoolName) -> Result<Vec<PoolMember>> {
        let mut state = self.state.lock();
        state.record(Operation::GetPoolMembers)?;
        state
            .pools
            .get(pool)
            .map(|m| m.iter().cloned().collect())
            .ok_or_else(|| LtmError::NotFound(format!("pool {}", pool)))
    }

    async fn add_pool_member(&self, pool: &PoolName, member: &PoolMember) -> Result<()> {
        let mut state = self.state.lock();
        state.record(Operation::AddPoolMember)?;
        let members = state
            .pools
            .get_mut(pool)
            .ok_or_else(|| LtmError::NotFound(format!("pool {}", pool)))?;
        if !members.insert(member.clone()) {
            return Err(LtmError::device(
                409,
                format!("member {} already exists in pool {}", member, pool),
            ));
        }
        Ok(())
    }

    async fn delete_pool_member(&self, pool: &PoolName, member: &PoolMember) -> Result<()> {
        let mut state = self.state.lock();
        state.record(Operation::DeletePoolMember)?;
        let members = state
            .pools
            .get_mut(pool)
            .ok_or_else(|| LtmError::NotFound(format!("pool {}", pool)))?;
        if !members.remove(member) {
            return Err(LtmError::NotFound(format!("member {} in pool {}", member, pool)));
        }
        Ok(())
    }

    async fn vserver_exists(&self, vserver: &str) -> Result<bool> {
        let mut state = self.state.lock();
        state.record(Operation::VserverExists)?;
        Ok(state.vservers.contains(vserver))
    }

    async fn add_vtep(&self, address: Ipv4Addr) -> Result<()> {
        let mut state = self.state.lock();
        state.record(Operation::AddVtep)?;
        state.vteps.insert(address);
        Ok(())
    }
}
