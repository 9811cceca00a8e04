//! A scripted authority and client joined by a lossy in-process queue.
//!
//! The authority moves, spawns and deletes entities each tick and sends
//! everything changed since the client's last acknowledged tick. The client
//! holds each message until the following one arrives so it can pass that
//! message's states along as `next`.

use std::collections::{HashMap, VecDeque};

use glam::Vec2;

use replica_common::{Box2, EntityId, Tick};
use replica_ecs::components::{Transform, net_ids};
use replica_ecs::{ComponentFactory, PrototypeRegistry};
use replica_kernel::{World, WorldConfig};
use replica_sync::{
    ApplyReport, EntitySnapshot, ReconcilerConfig, SnapshotReconciler, TickSnapshotMessage,
    capture_world,
};

/// Chance per tick that the authority deletes one entity, and separately
/// that it spawns one.
const CHURN_RATE: f64 = 0.1;
/// Half extent of the square new entities are placed in.
const SPAWN_AREA: f32 = 20.0;

pub struct SessionOptions {
    pub entities: u32,
    pub ticks: u64,
    pub drop_rate: f64,
    pub seed: u64,
    pub world: WorldConfig,
    pub reconciler: ReconcilerConfig,
}

#[derive(Debug, Default)]
pub struct SessionSummary {
    pub sent: usize,
    pub dropped: usize,
    pub applied: usize,
    pub created: usize,
    pub deleted: usize,
    pub broken: usize,
    pub skipped: usize,
    pub authority_entities: usize,
    pub client_entities: usize,
    pub tree_height: usize,
    pub at_origin: usize,
    pub mismatches: usize,
}

pub struct Session<'a> {
    factory: &'a ComponentFactory,
    prototypes: &'a PrototypeRegistry,
    options: SessionOptions,
    authority: World,
    client: World,
    rng: u64,
    next_server_id: u32,
    velocities: HashMap<EntityId, Vec2>,
    /// Deletions not yet known to be acknowledged, with their tick.
    deletions: Vec<(Tick, EntityId)>,
    last_acked: Tick,
    held: Option<TickSnapshotMessage>,
    summary: SessionSummary,
}

impl<'a> Session<'a> {
    pub fn new(
        factory: &'a ComponentFactory,
        prototypes: &'a PrototypeRegistry,
        options: SessionOptions,
    ) -> Self {
        Self {
            factory,
            prototypes,
            authority: World::with_config(options.world.clone()),
            client: World::with_config(options.world.clone()),
            rng: options.seed,
            next_server_id: 1,
            velocities: HashMap::new(),
            deletions: Vec::new(),
            last_acked: 0,
            held: None,
            summary: SessionSummary::default(),
            options,
        }
    }

    pub fn run(mut self) -> anyhow::Result<SessionSummary> {
        for _ in 0..self.options.entities {
            self.spawn_on_authority()?;
        }
        let reconciler =
            SnapshotReconciler::new(self.factory, self.prototypes, self.options.reconciler.clone());
        let mut queue: VecDeque<Vec<u8>> = VecDeque::new();

        for _ in 0..self.options.ticks {
            self.simulate_authority_tick()?;
            let bytes = self.outgoing()?.to_bytes()?;
            self.summary.sent += 1;
            if self.next_f64() < self.options.drop_rate {
                self.summary.dropped += 1;
                tracing::debug!(tick = self.authority.tick(), "message lost in transit");
            } else {
                queue.push_back(bytes);
            }
            while let Some(bytes) = queue.pop_front() {
                let message = TickSnapshotMessage::from_bytes(&bytes)?;
                self.receive(&reconciler, message)?;
            }
        }

        // One last delivery that is never lost, so both sides can be compared.
        let last = self.outgoing()?;
        self.summary.sent += 1;
        self.receive(&reconciler, last)?;
        if let Some(held) = self.held.take() {
            self.apply(&reconciler, held, &[])?;
        }

        self.verify();
        Ok(self.summary)
    }

    fn spawn_on_authority(&mut self) -> anyhow::Result<EntityId> {
        let prototypes = self.prototypes;
        let ids: Vec<&str> = prototypes.ids().collect();
        anyhow::ensure!(!ids.is_empty(), "no prototypes to spawn from");
        let pick = (self.next_u64() % ids.len() as u64) as usize;
        let prototype = prototypes.lookup(ids[pick])?;

        let id = EntityId::new(self.next_server_id);
        self.next_server_id += 1;
        let position = Vec2::new(self.next_signed() * SPAWN_AREA, self.next_signed() * SPAWN_AREA);
        // A quarter of the entities never move.
        let velocity = if self.next_u64() % 4 == 0 {
            Vec2::ZERO
        } else {
            Vec2::new(self.next_signed(), self.next_signed())
        };

        self.authority
            .allocate_entity_with_id(id, prototype, self.factory)?;
        if let Some(transform) = self.authority.component_mut::<Transform>(id) {
            transform.position = position;
        }
        self.authority.initialize_entity(id)?;
        self.authority.start_entity(id)?;
        self.authority.update_entity_tree(id);
        self.velocities.insert(id, velocity);
        tracing::debug!(%id, prototype = %prototype.id, "authority spawned entity");
        Ok(id)
    }

    fn simulate_authority_tick(&mut self) -> anyhow::Result<()> {
        let tick = self.authority.step();
        let ids: Vec<EntityId> = self.authority.entities().ids().collect();
        for &id in &ids {
            let velocity = self.velocities.get(&id).copied().unwrap_or(Vec2::ZERO);
            if velocity == Vec2::ZERO {
                continue;
            }
            if let Some(transform) = self.authority.component_mut::<Transform>(id) {
                transform.position += velocity;
            }
            self.authority.dirty_component(id, net_ids::TRANSFORM);
            self.authority.update_entity_tree(id);
        }

        if !ids.is_empty() && self.next_f64() < CHURN_RATE {
            let victim = ids[(self.next_u64() % ids.len() as u64) as usize];
            self.authority.delete_entity(victim);
            self.velocities.remove(&victim);
            self.deletions.push((tick, victim));
            tracing::debug!(%victim, "authority deleted entity");
        }
        if self.next_f64() < CHURN_RATE {
            self.spawn_on_authority()?;
        }
        self.authority.drain_events();
        Ok(())
    }

    /// Everything the client has not acknowledged yet.
    fn outgoing(&mut self) -> anyhow::Result<TickSnapshotMessage> {
        let acked = self.last_acked;
        self.deletions.retain(|&(tick, _)| tick > acked);
        let current = capture_world(&self.authority, acked)?;
        let deletions = self.deletions.iter().map(|&(_, id)| id).collect();
        Ok(TickSnapshotMessage::new(self.authority.tick(), current).with_deletions(deletions))
    }

    fn receive(
        &mut self,
        reconciler: &SnapshotReconciler<'_>,
        message: TickSnapshotMessage,
    ) -> anyhow::Result<()> {
        if let Some(held) = self.held.take() {
            self.apply(reconciler, held, &message.current)?;
        }
        self.held = Some(message);
        Ok(())
    }

    fn apply(
        &mut self,
        reconciler: &SnapshotReconciler<'_>,
        message: TickSnapshotMessage,
        next: &[EntitySnapshot],
    ) -> anyhow::Result<()> {
        self.client.set_tick(message.tick);
        let report = reconciler.apply(&mut self.client, &message.current, &message.deletions, next)?;
        self.last_acked = self.last_acked.max(message.tick);
        self.record(&report);
        self.client.drain_events();
        Ok(())
    }

    fn record(&mut self, report: &ApplyReport) {
        self.summary.applied += 1;
        self.summary.created += report.created.len();
        self.summary.deleted += report.deleted.len();
        self.summary.broken += report.broken.len();
        self.summary.skipped += report.skipped;
    }

    fn verify(&mut self) {
        let mut mismatches = 0;
        for id in self.authority.entities().ids() {
            let expected = self.authority.component::<Transform>(id).map(|t| t.position);
            let actual = self.client.component::<Transform>(id).map(|t| t.position);
            if expected != actual {
                tracing::warn!(%id, ?expected, ?actual, "entity differs on client");
                mismatches += 1;
            }
        }
        for id in self.client.entities().ids() {
            if !self.authority.contains(id) {
                tracing::warn!(%id, "client kept an entity the authority deleted");
                mismatches += 1;
            }
        }
        self.summary.mismatches = mismatches;
        self.summary.authority_entities = self.authority.entity_count();
        self.summary.client_entities = self.client.entity_count();
        self.summary.tree_height = self.client.tree().height();
        self.summary.at_origin = self.client.query_box(Box2::centered(5.0)).count();
    }

    fn next_u64(&mut self) -> u64 {
        self.rng = splitmix64(self.rng);
        self.rng
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform in `[-1, 1)`.
    fn next_signed(&mut self) -> f32 {
        (self.next_f64() * 2.0 - 1.0) as f32
    }
}

/// Splitmix64 step, used to drive motion and loss reproducibly from a seed.
fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
