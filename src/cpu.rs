use std::sync::Arc;
use std::thread;

use log::{debug, error, warn};

use crate::error::Result;
use crate::libmem;
use crate::proc::{Instruction, Pcb};
use crate::sched::Scheduler;
use crate::syscall;

/// How a dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceOutcome {
    /// Time slice used up, more instructions left
    Preempted,
    Finished,
    Killed,
}

/// Execute one instruction on behalf of `proc`
pub fn exec(proc: &Pcb, sched: &Scheduler, ins: Instruction) -> Result<()> {
    match ins {
        Instruction::Calc => Ok(()),
        Instruction::Alloc { size, reg } => libmem::alloc(proc, size, reg).map(|_| ()),
        Instruction::Free { reg } => libmem::free(proc, reg),
        Instruction::Read { reg, offset } => {
            let value = libmem::read(proc, reg, offset)?;
            proc.record(format!("read region={} offset={} value={}", reg, offset, value));
            Ok(())
        }
        Instruction::Write { value, reg, offset } => libmem::write(proc, reg, offset, value),
        Instruction::KillAll { reg } => syscall::sys_killall(proc, sched, reg).map(|_| ()),
    }
}

/// Run up to `time_slice` instructions. A failed instruction is reported and
/// the process carries on with the next one.
pub fn run_slice(proc: &Pcb, sched: &Scheduler, time_slice: usize) -> SliceOutcome {
    for _ in 0..time_slice {
        if proc.is_killed() {
            return SliceOutcome::Killed;
        }
        let Some(ins) = proc.fetch() else {
            return SliceOutcome::Finished;
        };
        if let Err(e) = exec(proc, sched, ins) {
            if e.is_internal() {
                error!("pid {}: {:?} hit a bookkeeping error: {}", proc.pid(), ins, e);
            } else {
                debug!("pid {}: {:?} failed: {}", proc.pid(), ins, e);
            }
        }
    }
    if proc.is_killed() {
        SliceOutcome::Killed
    } else if proc.is_finished() {
        SliceOutcome::Finished
    } else {
        SliceOutcome::Preempted
    }
}

fn retire(proc: &Pcb, sched: &Scheduler) {
    libmem::release_memory(proc);
    sched.finish(proc);
}

/// Worker loop: keep dispatching until every admitted process has left the
/// roster. Returns the number of dispatches this worker performed.
pub fn cpu_routine(id: usize, sched: &Scheduler, time_slice: usize) -> usize {
    let mut dispatches = 0;
    loop {
        let Some(proc) = sched.get_next() else {
            if sched.roster_is_empty() && sched.is_idle() {
                break;
            }
            thread::yield_now();
            continue;
        };
        dispatches += 1;
        match run_slice(&proc, sched, time_slice) {
            SliceOutcome::Preempted => {
                if let Err(e) = sched.requeue(Arc::clone(&proc)) {
                    warn!("cpu {}: cannot requeue pid {}: {}", id, proc.pid(), e);
                    retire(&proc, sched);
                }
            }
            SliceOutcome::Finished => {
                debug!("cpu {}: pid {} ({}) finished", id, proc.pid(), proc.path());
                retire(&proc, sched);
            }
            SliceOutcome::Killed => {
                debug!("cpu {}: pid {} ({}) killed", id, proc.pid(), proc.path());
                retire(&proc, sched);
            }
        }
    }
    dispatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::memphy::{lock, MemPhy, SharedMemPhy};
    use crate::syscall::NAME_TERMINATOR;

    fn spawn(pid: u32, name: &str, prio: usize, code: Vec<Instruction>, cfg: &Config, ram: &SharedMemPhy, swp: &SharedMemPhy) -> Arc<Pcb> {
        Arc::new(Pcb::new(pid, name, prio, code, cfg, ram.clone(), swp.clone()))
    }

    #[test]
    fn test_run_slice_outcomes() {
        let cfg = Config::default();
        let (ram, swp) = (MemPhy::shared(4), MemPhy::shared(4));
        let sched = Scheduler::init(&cfg);
        let code = vec![
            Instruction::Alloc { size: 16, reg: 0 },
            Instruction::Write { value: 9, reg: 0, offset: 3 },
            Instruction::Read { reg: 0, offset: 3 },
        ];
        let p = spawn(1, "p", 0, code, &cfg, &ram, &swp);

        assert_eq!(run_slice(&p, &sched, 2), SliceOutcome::Preempted);
        assert_eq!(run_slice(&p, &sched, 2), SliceOutcome::Finished);
        assert_eq!(p.output(), vec!["read region=0 offset=3 value=9".to_string()]);
    }

    #[test]
    fn test_failed_instruction_does_not_stop_process() {
        let cfg = Config::default();
        let (ram, swp) = (MemPhy::shared(4), MemPhy::shared(4));
        let sched = Scheduler::init(&cfg);
        let code = vec![
            Instruction::Free { reg: 5 },
            Instruction::Alloc { size: 4, reg: 0 },
            Instruction::Read { reg: 0, offset: 0 },
        ];
        let p = spawn(1, "p", 0, code, &cfg, &ram, &swp);

        assert_eq!(run_slice(&p, &sched, 10), SliceOutcome::Finished);
        assert_eq!(p.output().len(), 1);
    }

    #[test]
    fn test_killed_process_stops() {
        let cfg = Config::default();
        let (ram, swp) = (MemPhy::shared(4), MemPhy::shared(4));
        let sched = Scheduler::init(&cfg);
        let p = spawn(1, "p", 0, vec![Instruction::Calc; 5], &cfg, &ram, &swp);

        p.kill();
        assert_eq!(run_slice(&p, &sched, 3), SliceOutcome::Killed);
        assert_eq!(p.pc(), 0);
    }

    #[test]
    fn test_workers_drain_everything() {
        let cfg = Config { ram_frames: 8, time_slice: 2, ..Config::default() };
        let (ram, swp) = (MemPhy::shared(cfg.ram_frames), MemPhy::shared(cfg.swap_slots));
        let sched = Scheduler::init(&cfg);

        // "killer" writes "s1" and kills every s1; the s1s spin on calc
        let mut killer_code = vec![Instruction::Alloc { size: 8, reg: 0 }];
        for (i, b) in b"s1".iter().enumerate() {
            killer_code.push(Instruction::Write { value: *b, reg: 0, offset: i });
        }
        killer_code.push(Instruction::Write { value: NAME_TERMINATOR, reg: 0, offset: 2 });
        killer_code.push(Instruction::KillAll { reg: 0 });

        let mut procs = vec![spawn(1, "killer", 0, killer_code, &cfg, &ram, &swp)];
        for pid in 2..6 {
            let code = vec![
                Instruction::Alloc { size: 600, reg: 1 },
                Instruction::Write { value: pid as u8, reg: 1, offset: 500 },
            ]
            .into_iter()
            .chain(std::iter::repeat(Instruction::Calc).take(200))
            .collect();
            procs.push(spawn(pid, "s1", 1, code, &cfg, &ram, &swp));
        }
        procs.push(spawn(9, "s2", 2, vec![Instruction::Calc; 3], &cfg, &ram, &swp));
        for p in &procs {
            sched.admit(p.clone()).unwrap();
        }

        let total: usize = thread::scope(|scope| {
            let workers: Vec<_> = (0..3).map(|id| {
                let sched = &sched;
                scope.spawn(move || cpu_routine(id, sched, cfg.time_slice))
            }).collect();
            workers.into_iter().map(|w| w.join().unwrap()).sum()
        });

        assert!(total > 0);
        assert!(sched.roster_is_empty());
        assert!(sched.is_idle());
        assert!(procs[1..5].iter().all(|p| p.is_killed()));
        assert!(procs[5].is_finished());
        assert_eq!(lock(&ram).free_count(), cfg.ram_frames);
        assert_eq!(lock(&swp).free_count(), cfg.swap_slots);
    }
}
