//! Communication-task-graph traffic.
//!
//! Task records arrive through opaque loaders (JSON documents here; the
//! XML front-end of mapping tools is out of scope). Each node gets a
//! program: its local tasks with execution times, the inbound data volumes
//! it must collect per iteration, and the outbound volumes it sends once
//! its core has executed. Iterations are independent and may overlap in
//! the network; core executions of one node never overlap each other.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::engine::{Duration, VirtualTime};
use crate::error::{NocError, Result};
use crate::flit::Flit;
use crate::network::NodeId;
use crate::sim::Simulation;

// ---------------------------------------------------------------------------
// Loader records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    /// Core execution time in seconds.
    pub execution_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub from: String,
    pub to: String,
    pub volume_bits: u64,
}

/// Communication task graph: tasks and the directed bit-volume edges
/// between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ctg {
    pub tasks: Vec<TaskRecord>,
    pub dependencies: Vec<DependencyRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreRecord {
    pub id: String,
    pub tasks: Vec<String>,
}

/// Application characterization graph: tasks grouped by IP core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Apcg {
    pub cores: Vec<CoreRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub core: String,
    pub node: u32,
}

/// Assignment of IP cores to NoC nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mapping {
    pub assignments: Vec<AssignmentRecord>,
}

pub fn load_ctg(path: impl AsRef<Path>) -> Result<Ctg> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn load_apcg(path: impl AsRef<Path>) -> Result<Apcg> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn load_mapping(path: impl AsRef<Path>) -> Result<Mapping> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

// ---------------------------------------------------------------------------
// Per-node programs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LocalTask {
    pub id: String,
    pub execution_time: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct OutboundDependency {
    pub dst: NodeId,
    pub volume_bits: u64,
}

/// Everything one node needs to execute its share of the CTG.
#[derive(Debug, Clone, Default)]
pub struct CtgProgram {
    pub tasks: Vec<LocalTask>,
    /// Bits expected from remote tasks, per iteration.
    pub inbound_volumes: Vec<u64>,
    pub outbound: Vec<OutboundDependency>,
    /// At least one local task has no inbound dependency at all.
    pub has_independent_task: bool,
}

impl CtgProgram {
    pub fn total_inbound_bits(&self) -> u64 {
        self.inbound_volumes.iter().sum()
    }

    pub fn execution_time(&self) -> Duration {
        self.tasks
            .iter()
            .fold(Duration::ZERO, |acc, t| acc + t.execution_time)
    }

    /// Root nodes start on the CTG period: nodes with an independent task,
    /// or with nothing to wait for.
    pub fn is_root(&self) -> bool {
        self.has_independent_task || self.inbound_volumes.is_empty()
    }

    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty() && self.outbound.is_empty() && self.inbound_volumes.is_empty()
    }
}

fn seconds_to_duration(seconds: f64) -> Result<Duration> {
    if !(seconds >= 0.0) || seconds > 1e6 {
        return Err(NocError::config(format!(
            "task execution time {} s out of range",
            seconds
        )));
    }
    Ok(Duration::from_picos((seconds * 1e12).round() as u64))
}

/// Resolve the three record sets into per-node programs. Dependencies whose
/// endpoints map to the same node are served locally and produce no
/// network traffic.
pub fn build_programs(
    ctg: &Ctg,
    apcg: &Apcg,
    mapping: &Mapping,
    node_count: usize,
) -> Result<Vec<CtgProgram>> {
    let mut core_of_task: HashMap<&str, &str> = HashMap::new();
    for core in &apcg.cores {
        for task in &core.tasks {
            core_of_task.insert(task.as_str(), core.id.as_str());
        }
    }
    let mut node_of_core: HashMap<&str, u32> = HashMap::new();
    for assignment in &mapping.assignments {
        if assignment.node as usize >= node_count {
            return Err(NocError::config(format!(
                "core {} mapped to node {} outside the {}-node network",
                assignment.core, assignment.node, node_count
            )));
        }
        node_of_core.insert(assignment.core.as_str(), assignment.node);
    }

    let node_of_task = |task: &str| -> Result<usize> {
        let core = core_of_task
            .get(task)
            .ok_or_else(|| NocError::config(format!("task {} missing from the APCG", task)))?;
        let node = node_of_core
            .get(core)
            .ok_or_else(|| NocError::config(format!("core {} missing from the mapping", core)))?;
        Ok(*node as usize)
    };

    let mut programs: Vec<CtgProgram> = vec![CtgProgram::default(); node_count];

    let dependent_tasks: std::collections::HashSet<&str> =
        ctg.dependencies.iter().map(|d| d.to.as_str()).collect();

    for task in &ctg.tasks {
        let node = node_of_task(&task.id)?;
        if !dependent_tasks.contains(task.id.as_str()) {
            programs[node].has_independent_task = true;
        }
        programs[node].tasks.push(LocalTask {
            id: task.id.clone(),
            execution_time: seconds_to_duration(task.execution_time)?,
        });
    }

    for dep in &ctg.dependencies {
        let src = node_of_task(&dep.from)?;
        let dst = node_of_task(&dep.to)?;
        if src == dst {
            trace!(from = %dep.from, to = %dep.to, "dependency served locally");
            continue;
        }
        programs[src].outbound.push(OutboundDependency {
            dst: NodeId(dst),
            volume_bits: dep.volume_bits,
        });
        programs[dst].inbound_volumes.push(dep.volume_bits);
    }

    info!(
        tasks = ctg.tasks.len(),
        dependencies = ctg.dependencies.len(),
        "CTG programs built"
    );
    Ok(programs)
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct QueuedFlit {
    flit: Flit,
    /// Not before the owning core finished executing.
    ready_at: VirtualTime,
}

pub struct CtgGenerator {
    node: NodeId,
    program: CtgProgram,
    iterations: u32,
    period: Duration,
    /// Bits received so far, indexed by iteration.
    received_bits: Vec<u64>,
    /// Iterations whose execution has been kicked off.
    kicked: Vec<bool>,
    core_busy_until: VirtualTime,
    core_busy_total: Duration,
    queue: VecDeque<QueuedFlit>,
    pending: Option<Flit>,
    tick_chain_active: bool,
}

impl CtgGenerator {
    pub fn new(node: NodeId, program: CtgProgram, iterations: u32, period: Duration) -> Self {
        CtgGenerator {
            node,
            program,
            received_bits: vec![0; iterations as usize],
            kicked: vec![false; iterations as usize],
            iterations,
            period,
            core_busy_until: VirtualTime::ZERO,
            core_busy_total: Duration::ZERO,
            queue: VecDeque::new(),
            pending: None,
            tick_chain_active: false,
        }
    }

    pub fn core_busy(&self) -> Duration {
        self.core_busy_total
    }

    pub fn received_bits(&self, iteration: u32) -> u64 {
        self.received_bits
            .get(iteration as usize)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn start(&mut self, sim: &mut Simulation) -> Result<()> {
        if self.program.is_idle() {
            return Ok(());
        }
        if self.program.is_root() {
            // Periodicity applies to CTG roots only; dependent nodes start
            // when their data completes.
            for i in 0..self.iterations {
                self.kicked[i as usize] = true;
                let at = VirtualTime::ZERO + self.period * i as u64;
                sim.schedule_kickoff(self.node, i, at);
            }
        }
        Ok(())
    }

    /// The iteration's inputs are satisfied: run the core, then queue the
    /// outbound volumes. Core time is monotonic; two executions of the same
    /// core never overlap.
    pub(crate) fn kickoff(&mut self, sim: &mut Simulation, iteration: u32) -> Result<()> {
        let now = sim.now();
        let exec = self.program.execution_time();
        let start = if self.core_busy_until > now {
            self.core_busy_until
        } else {
            now
        };
        let end = start + exec;
        self.core_busy_until = end;
        self.core_busy_total = self.core_busy_total + exec;
        debug!(
            node = %self.node,
            iteration,
            start = %start,
            end = %end,
            "CTG core execution"
        );

        // Injection begins on the clock boundary after execution ends.
        let ready_at = end.ceil_to(sim.config().clock());
        self.queue_outbound(sim, iteration, ready_at)?;

        if !self.queue.is_empty() && !self.tick_chain_active {
            self.tick_chain_active = true;
            let delay = ready_at - now;
            sim.schedule_source_tick(self.node, delay);
        }
        Ok(())
    }

    fn queue_outbound(
        &mut self,
        sim: &mut Simulation,
        iteration: u32,
        ready_at: VirtualTime,
    ) -> Result<()> {
        let flit_size = sim.config().flit_size_bytes;
        let flit_bits = sim.config().flit_bits();
        let header_bits = sim.config().header_size_bytes() as u64 * 8;
        let head_payload_bits = flit_bits - header_bits;

        for dep in self.program.outbound.clone() {
            let flit_count = message_flit_count(dep.volume_bits, head_payload_bits, flit_bits);
            let data_flit_count = u16::try_from(flit_count - 1).map_err(|_| {
                NocError::config(format!(
                    "volume of {} bits needs {} flits, above the header field limit",
                    dep.volume_bits, flit_count
                ))
            })?;

            let header = sim
                .topology()
                .relative_header(self.node, dep.dst, data_flit_count)?;
            if header.is_empty() {
                continue;
            }
            let uid = sim.alloc_uid();
            let mut head = Flit::head(uid, header, flit_size, ready_at)?;
            head.meta.ctg_iteration = Some(iteration);
            let head_uid = head.uid;
            self.queue.push_back(QueuedFlit {
                flit: head,
                ready_at,
            });
            for k in 1..flit_count {
                let uid = sim.alloc_uid();
                let mut flit = if k + 1 == flit_count {
                    // The last flit is the tail even when the packet is
                    // partially filled.
                    Flit::tail(uid, head_uid, flit_size, ready_at)
                } else {
                    Flit::body(uid, head_uid, flit_size, ready_at)
                };
                flit.meta.ctg_iteration = Some(iteration);
                self.queue.push_back(QueuedFlit {
                    flit,
                    ready_at,
                });
            }
            trace!(
                node = %self.node,
                dst = %dep.dst,
                iteration,
                flits = flit_count,
                "queued CTG message"
            );
        }
        Ok(())
    }

    pub(crate) fn on_tick(&mut self, sim: &mut Simulation) -> Result<Option<Duration>> {
        let clock = sim.config().clock();
        let speedup = sim.config().data_flit_speedup as u64;

        if let Some(flit) = self.pending.take() {
            if !sim.inject(self.node, &flit)? {
                self.pending = Some(flit);
                return Ok(Some(clock));
            }
            return Ok(Some(clock / speedup));
        }

        let Some(next) = self.queue.front() else {
            self.tick_chain_active = false;
            return Ok(None);
        };
        if next.ready_at > sim.now() {
            let wait = next.ready_at - sim.now();
            return Ok(Some(wait));
        }
        let flit = match self.queue.pop_front() {
            Some(q) => q.flit,
            None => {
                self.tick_chain_active = false;
                return Ok(None);
            }
        };
        if sim.inject(self.node, &flit)? {
            Ok(Some(clock / speedup))
        } else {
            self.pending = Some(flit);
            Ok(Some(clock))
        }
    }

    /// Accumulate a received flit's payload into its iteration's ledger and
    /// kick the dependent execution once all inbound volumes are in.
    pub(crate) fn on_flit_received(&mut self, sim: &mut Simulation, flit: &Flit) -> Result<()> {
        let iteration = match flit.meta.ctg_iteration {
            Some(i) => i,
            // Non-CTG traffic can legitimately land on a CTG node.
            None => return Ok(()),
        };
        if iteration >= self.iterations {
            return Err(NocError::invariant(format!(
                "flit {} carries CTG iteration {} of {}",
                flit.uid, iteration, self.iterations
            )));
        }
        let total = self.program.total_inbound_bits();
        if total == 0 {
            return Ok(());
        }
        let slot = &mut self.received_bits[iteration as usize];
        *slot = (*slot + flit.payload_bits()).min(total);
        trace!(
            node = %self.node,
            iteration,
            received = *slot,
            expected = total,
            "CTG data received"
        );

        if *slot >= total && !self.kicked[iteration as usize] {
            self.kicked[iteration as usize] = true;
            info!(
                node = %self.node,
                iteration,
                bits = total,
                "CTG iteration inputs complete"
            );
            sim.schedule_kickoff(self.node, iteration, sim.now());
        }
        Ok(())
    }
}

/// Flits for one message of `volume_bits`: the head loses the header bytes
/// of payload, every packet has at least a head and a tail, and the last
/// flit may be partially filled.
fn message_flit_count(volume_bits: u64, head_payload_bits: u64, flit_bits: u64) -> u64 {
    let data_bits = volume_bits.saturating_sub(head_payload_bits);
    let data_flits = data_bits.div_ceil(flit_bits);
    (1 + data_flits).max(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_flit_count() {
        // 32-byte flits, 4-byte header: 224 usable head bits, 256 per flit.
        assert_eq!(message_flit_count(1, 224, 256), 2);
        assert_eq!(message_flit_count(224, 224, 256), 2);
        assert_eq!(message_flit_count(225, 224, 256), 2);
        assert_eq!(message_flit_count(480, 224, 256), 2);
        assert_eq!(message_flit_count(481, 224, 256), 3);
        assert_eq!(message_flit_count(256, 224, 256), 2);
    }

    #[test]
    fn test_build_programs_resolves_mapping() {
        let ctg = Ctg {
            tasks: vec![
                TaskRecord {
                    id: "t0".into(),
                    execution_time: 2e-9,
                },
                TaskRecord {
                    id: "t1".into(),
                    execution_time: 1e-9,
                },
            ],
            dependencies: vec![DependencyRecord {
                from: "t0".into(),
                to: "t1".into(),
                volume_bits: 256,
            }],
        };
        let apcg = Apcg {
            cores: vec![
                CoreRecord {
                    id: "c0".into(),
                    tasks: vec!["t0".into()],
                },
                CoreRecord {
                    id: "c1".into(),
                    tasks: vec!["t1".into()],
                },
            ],
        };
        let mapping = Mapping {
            assignments: vec![
                AssignmentRecord {
                    core: "c0".into(),
                    node: 0,
                },
                AssignmentRecord {
                    core: "c1".into(),
                    node: 1,
                },
            ],
        };

        let programs = build_programs(&ctg, &apcg, &mapping, 2).unwrap();
        assert!(programs[0].is_root());
        assert_eq!(programs[0].outbound.len(), 1);
        assert_eq!(programs[0].outbound[0].dst, NodeId(1));
        assert_eq!(programs[0].execution_time(), Duration::from_nanos(2));
        assert!(!programs[1].is_root());
        assert_eq!(programs[1].total_inbound_bits(), 256);
        assert!(programs[1].outbound.is_empty());
    }

    #[test]
    fn test_local_dependency_produces_no_traffic() {
        let ctg = Ctg {
            tasks: vec![
                TaskRecord {
                    id: "t0".into(),
                    execution_time: 0.0,
                },
                TaskRecord {
                    id: "t1".into(),
                    execution_time: 0.0,
                },
            ],
            dependencies: vec![DependencyRecord {
                from: "t0".into(),
                to: "t1".into(),
                volume_bits: 64,
            }],
        };
        let apcg = Apcg {
            cores: vec![CoreRecord {
                id: "c0".into(),
                tasks: vec!["t0".into(), "t1".into()],
            }],
        };
        let mapping = Mapping {
            assignments: vec![AssignmentRecord {
                core: "c0".into(),
                node: 0,
            }],
        };
        let programs = build_programs(&ctg, &apcg, &mapping, 4).unwrap();
        assert!(programs[0].outbound.is_empty());
        assert_eq!(programs[0].total_inbound_bits(), 0);
    }

    #[test]
    fn test_unmapped_task_rejected() {
        let ctg = Ctg {
            tasks: vec![TaskRecord {
                id: "t0".into(),
                execution_time: 0.0,
            }],
            dependencies: vec![],
        };
        let apcg = Apcg { cores: vec![] };
        let mapping = Mapping {
            assignments: vec![],
        };
        assert!(matches!(
            build_programs(&ctg, &apcg, &mapping, 2),
            Err(NocError::Configuration(_))
        ));
    }

    #[test]
    fn test_loaders_parse_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctg.json");
        std::fs::write(
            &path,
            r#"{"tasks":[{"id":"t0","execution_time":1e-9}],
                "dependencies":[{"from":"t0","to":"t0","volume_bits":128}]}"#,
        )
        .unwrap();
        let ctg = load_ctg(&path).unwrap();
        assert_eq!(ctg.tasks.len(), 1);
        assert_eq!(ctg.dependencies[0].volume_bits, 128);
    }
}
