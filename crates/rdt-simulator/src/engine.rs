use std::collections::HashMap;

use rdt_abstract::{Message, Packet, SimConfig, SystemContext, TransportProtocol};
use rdt_protocols::{ReceiverMachine, SenderMachine, builtin_by_name, builtin_pair};
use serde::Serialize;
use tracing::{debug, debug_span, info};

use crate::SimError;
use crate::link::{LinkOutcome, UnreliableLink};
use crate::random::{OsiRandom, STREAM_ARRIVAL};
use crate::scheduler::{EventHandle, Scheduler};
use crate::trace::{EndpointStats, SimulationReport, mean, rate, word_count};

/// Cap on the link timeline kept for the report.
const MAX_LINK_EVENTS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    PacketArrival { to: NodeId, packet: Packet },
    TimerExpiry { node: NodeId },
    AppSend { message: Message },
}

/// A compact textual summary of a link-layer fault or delivery.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: f64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Ready,
    Running,
    /// Quota reached; waiting for the sender to go idle.
    Draining { deadline: f64 },
    Finished,
}

/// Work requested by an endpoint during one handler call, in call order.
#[derive(Debug)]
enum Action {
    Send(Packet),
    Retransmit(Packet),
    StartTimer(f64),
    StopTimer,
    Deliver(String),
    Log(String),
    Metric(String, f64),
}

#[derive(Default)]
struct ActionBuffer {
    actions: Vec<Action>,
}

/// Context handed to an endpoint for the duration of one handler call.
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: f64,
}

impl SystemContext for ScopedContext<'_> {
    fn send_packet(&mut self, packet: Packet) {
        self.buffer.actions.push(Action::Send(packet));
    }

    fn retransmit_packet(&mut self, packet: Packet) {
        self.buffer.actions.push(Action::Retransmit(packet));
    }

    fn start_timer(&mut self, delay: f64) {
        self.buffer.actions.push(Action::StartTimer(delay));
    }

    fn stop_timer(&mut self) {
        self.buffer.actions.push(Action::StopTimer);
    }

    fn deliver_data(&mut self, data: &str) {
        self.buffer.actions.push(Action::Deliver(data.to_string()));
    }

    fn log(&mut self, message: &str) {
        self.buffer.actions.push(Action::Log(message.to_string()));
    }

    fn now(&self) -> f64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.buffer
            .actions
            .push(Action::Metric(name.to_string(), value));
    }
}

/// One run of a sender/receiver pair over two unreliable links.
pub struct Simulator<S = SenderMachine, R = ReceiverMachine> {
    scheduler: Scheduler<EventType>,
    rng: OsiRandom,
    config: SimConfig,

    sender: S,
    receiver: R,
    sender_to_receiver: UnreliableLink,
    receiver_to_sender: UnreliableLink,

    /// At most one pending timer per node.
    timers: HashMap<NodeId, EventHandle>,

    sender_stats: EndpointStats,
    receiver_stats: EndpointStats,
    output: Vec<String>,
    /// Samples recorded via `SystemContext::record_metric`, as (time, value).
    metrics: HashMap<String, Vec<(f64, f64)>>,
    link_events: Vec<LinkEventSummary>,

    phase: Phase,
    initialized: bool,
}

impl Simulator {
    /// Build the built-in protocol pair named by `config.protocol`.
    pub fn from_config(config: SimConfig) -> Result<Self, SimError> {
        let (sender, receiver) = builtin_pair(&config);
        Self::new(config, sender, receiver)
    }

    /// Like [`Simulator::from_config`], with the protocol given by name.
    /// Unknown names are rejected before anything is built.
    pub fn from_name(protocol: &str, config: SimConfig) -> Result<Self, SimError> {
        let (sender, receiver) = builtin_by_name(protocol, &config)?;
        let config = SimConfig {
            protocol: sender.protocol(),
            ..config
        };
        Self::new(config, sender, receiver)
    }
}

impl<S: TransportProtocol, R: TransportProtocol> Simulator<S, R> {
    pub fn new(config: SimConfig, sender: S, receiver: R) -> Result<Self, SimError> {
        config.validate()?;
        let rng = OsiRandom::new(config.seed);
        let sender_to_receiver = UnreliableLink::new(
            NodeId::Sender,
            config.loss_probability,
            config.corruption_probability,
        );
        let receiver_to_sender = UnreliableLink::new(
            NodeId::Receiver,
            config.loss_probability,
            config.corruption_probability,
        );

        Ok(Self {
            scheduler: Scheduler::new(),
            rng,
            config,
            sender,
            receiver,
            sender_to_receiver,
            receiver_to_sender,
            timers: HashMap::new(),
            sender_stats: EndpointStats::default(),
            receiver_stats: EndpointStats::default(),
            output: Vec::new(),
            metrics: HashMap::new(),
            link_events: Vec::new(),
            phase: Phase::Ready,
            initialized: false,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    pub fn current_time(&self) -> f64 {
        self.scheduler.now()
    }

    pub fn remaining_events(&self) -> usize {
        self.scheduler.len()
    }

    pub fn timer_pending(&self, node: NodeId) -> bool {
        self.timers
            .get(&node)
            .is_some_and(|handle| self.scheduler.is_pending(*handle))
    }

    /// Lines delivered to layer 5 on the receiving side so far.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn metric_series(&self, name: &str) -> Option<&[(f64, f64)]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    /// Run both endpoints' `init` hooks. Called by [`Simulator::run`];
    /// repeated calls are no-ops.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        self.invoke(NodeId::Sender, |endpoint, ctx| endpoint.init(ctx));
        self.invoke(NodeId::Receiver, |endpoint, ctx| endpoint.init(ctx));
    }

    /// Queue a layer-5 message at an absolute time. It counts towards the
    /// message quota like a generated one.
    pub fn schedule_app_send(&mut self, time: f64, message: Message) -> EventHandle {
        self.scheduler
            .schedule_at(time, EventType::AppSend { message })
    }

    /// Hand `message` straight to the sender, bypassing message generation
    /// and the quota.
    pub fn dispatch_message(&mut self, message: Message) {
        self.invoke(NodeId::Sender, |endpoint, ctx| {
            endpoint.from_layer5(ctx, message)
        });
    }

    /// Deliver `packet` to `to` right now, as if it had just arrived.
    pub fn deliver_packet(&mut self, to: NodeId, packet: Packet) {
        let stats = self.stats_mut(to);
        stats.num_received += 1;
        if packet.is_corrupt() {
            stats.num_corrupt += 1;
        }
        self.invoke(to, |endpoint, ctx| endpoint.from_layer3(ctx, packet));
    }

    /// Execute the whole simulation and return its results. A simulator can
    /// only be run once.
    pub fn run(&mut self) -> Result<SimulationReport, SimError> {
        if self.phase != Phase::Ready {
            return Err(SimError::AlreadyRun);
        }
        info!(
            "Starting {} simulation: {} messages",
            self.config.protocol, self.config.num_messages
        );
        self.init();
        self.phase = Phase::Running;
        if self.config.num_messages > 0 {
            self.generate_next_arrival();
        } else {
            // init may have started a periodic timer
            self.purge("message quota reached");
        }
        while self.step() {}
        self.phase = Phase::Finished;
        info!(
            "Simulation complete at t={:.3}: {} lines delivered",
            self.scheduler.now(),
            self.output.len()
        );
        Ok(self.report())
    }

    /// Process the next event. Returns true if an event was processed, false
    /// if the queue is empty or the run has been cut off.
    pub fn step(&mut self) -> bool {
        if let Phase::Draining { deadline } = self.phase {
            if self.scheduler.peek_time().is_some_and(|t| t > deadline) {
                self.purge("drain limit reached");
                return false;
            }
        }

        let Some((_, event)) = self.scheduler.pop() else {
            return false;
        };
        let span = debug_span!("sim_event", time = self.scheduler.now());
        let _entered = span.enter();
        debug!("Processing {:?}", event);

        match event {
            EventType::PacketArrival { to, packet } => self.deliver_packet(to, packet),
            EventType::TimerExpiry { node } => {
                self.timers.remove(&node);
                self.invoke(node, |endpoint, ctx| endpoint.timer_interrupt(ctx));
            }
            EventType::AppSend { message } => self.accept_message(message),
        }

        if matches!(self.phase, Phase::Draining { .. }) && self.sender.is_idle() {
            self.purge("sender idle after final message");
        }
        true
    }

    /// Snapshot of the results so far.
    pub fn report(&self) -> SimulationReport {
        let rtts: Vec<f64> = self
            .metric_series("rtt")
            .map(|samples| samples.iter().map(|(_, v)| *v).collect())
            .unwrap_or_default();
        let duration = self.scheduler.now();
        SimulationReport {
            config: self.config.clone(),
            duration,
            throughput: rate(self.receiver_stats.num_received as f64, duration),
            goodput: rate(word_count(&self.output) as f64, duration),
            mean_rtt: mean(&rtts),
            rtts,
            num_sent: self.sender_stats.num_sent,
            num_retransmitted: self.sender_stats.num_retransmitted,
            num_corrupt: self.sender_to_receiver.num_corrupt()
                + self.receiver_to_sender.num_corrupt(),
            num_lost: self.sender_to_receiver.num_lost() + self.receiver_to_sender.num_lost(),
            sender: self.sender_stats.clone(),
            receiver: self.receiver_stats.clone(),
            output: self.output.clone(),
            metrics: self.metrics.clone(),
            link_events: self.link_events.clone(),
        }
    }

    fn accept_message(&mut self, message: Message) {
        self.invoke(NodeId::Sender, |endpoint, ctx| {
            endpoint.from_layer5(ctx, message)
        });
        self.sender_stats.num_sent += 1;
        if self.sender_stats.num_sent < self.config.num_messages {
            self.generate_next_arrival();
            return;
        }
        match self.config.drain_limit {
            Some(limit) if self.phase != Phase::Finished => {
                self.phase = Phase::Draining {
                    deadline: self.scheduler.now() + limit,
                };
            }
            _ => self.purge("message quota reached"),
        }
    }

    fn generate_next_arrival(&mut self) -> EventHandle {
        let delay = self
            .rng
            .exponential(STREAM_ARRIVAL, self.config.avg_delay);
        let message = Message::synthetic(self.sender_stats.num_sent);
        self.scheduler
            .schedule(delay, EventType::AppSend { message })
    }

    fn purge(&mut self, reason: &str) {
        debug!(
            "Clearing {} events from the scheduler queue ({})",
            self.scheduler.len(),
            reason
        );
        self.scheduler.clear();
        self.timers.clear();
        self.phase = Phase::Finished;
    }

    fn stats_mut(&mut self, node: NodeId) -> &mut EndpointStats {
        match node {
            NodeId::Sender => &mut self.sender_stats,
            NodeId::Receiver => &mut self.receiver_stats,
        }
    }

    fn invoke(
        &mut self,
        node: NodeId,
        f: impl FnOnce(&mut dyn TransportProtocol, &mut dyn SystemContext),
    ) {
        let mut buffer = ActionBuffer::default();
        {
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.scheduler.now(),
            };
            let endpoint: &mut dyn TransportProtocol = match node {
                NodeId::Sender => &mut self.sender,
                NodeId::Receiver => &mut self.receiver,
            };
            f(endpoint, &mut ctx);
        }
        self.process_actions(node, buffer);
    }

    fn process_actions(&mut self, node: NodeId, buffer: ActionBuffer) {
        for action in buffer.actions {
            match action {
                Action::Send(packet) => self.transmit(node, &packet, false),
                Action::Retransmit(packet) => self.transmit(node, &packet, true),
                Action::StartTimer(delay) => {
                    if !self.timer_pending(node) {
                        let handle = self
                            .scheduler
                            .schedule(delay, EventType::TimerExpiry { node });
                        self.timers.insert(node, handle);
                    }
                }
                Action::StopTimer => {
                    if let Some(handle) = self.timers.remove(&node) {
                        self.scheduler.cancel(handle);
                    }
                }
                Action::Deliver(data) => {
                    debug!("[{:?}] DELIVERED {}", node, data);
                    self.record_link_event(format!("[{node:?}] DELIVERED {data}"));
                    self.output.push(data);
                }
                Action::Log(line) => info!("[{:?}] {}", node, line),
                Action::Metric(name, value) => {
                    let now = self.scheduler.now();
                    self.metrics.entry(name).or_default().push((now, value));
                }
            }
        }
    }

    fn transmit(&mut self, node: NodeId, packet: &Packet, retransmission: bool) {
        let stats = self.stats_mut(node);
        stats.num_transmitted += 1;
        if retransmission {
            stats.num_retransmitted += 1;
        }

        let link = match node {
            NodeId::Sender => &mut self.sender_to_receiver,
            NodeId::Receiver => &mut self.receiver_to_sender,
        };
        let outcome = link.send(packet, &mut self.scheduler, &mut self.rng);
        let direction = format!("[{:?}->{:?}]", node, node.peer());
        match outcome {
            LinkOutcome::Lost => self.record_link_event(format!(
                "{direction} DROP seq={} ack={}",
                packet.seqnum, packet.acknum
            )),
            LinkOutcome::Delivered {
                corrupted: Some(kind),
                at,
            } => self.record_link_event(format!(
                "{direction} CORRUPT ({kind:?}) seq={} ack={} arriving at {at:.3}",
                packet.seqnum, packet.acknum
            )),
            LinkOutcome::Delivered { corrupted: None, .. } => {}
        }
    }

    fn record_link_event(&mut self, description: String) {
        if self.link_events.len() < MAX_LINK_EVENTS {
            self.link_events.push(LinkEventSummary {
                time: self.scheduler.now(),
                description,
            });
        }
    }
}
