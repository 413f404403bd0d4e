//! Paging simulator - Main Entry Point
//!
//! Usage: paging-sim [OPTIONS] <workload_file> [output_file]
//!
//! Arguments:
//!   workload_file - Processes and their instructions
//!   output_file   - File to write the values read by each process (stdout if omitted)
//!
//! Options:
//!   --frames N   RAM frames shared by all processes
//!   --swap N     Swap slots
//!   --cpus N     Worker threads
//!   --slice N    Instructions per dispatch
//!   --queue N    Capacity of each ready queue
//!   --prio N     Number of priority levels
//!   --single     Single priority queue
//!   --mlq        Multi-level queues (default)
//!   --dump       Log page table and RAM after every memory syscall
//!   -v, -vv      More logging
//!   -h, --help   Print help information

use std::env;
use std::process;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record};

use paging_sim::config::{Config as SimConfig, SchedPolicy};
use paging_sim::cpu::cpu_routine;
use paging_sim::io::{write_results, Workload};
use paging_sim::memphy::{lock, MemPhy};
use paging_sim::proc::Pcb;
use paging_sim::sched::Scheduler;

/// Command-line configuration
struct Config {
    workload_file: String,
    output_file: Option<String>,
    verbosity: usize,
    sim: SimConfig,
}

/// Writes every record to stderr, prefixed with its level and module
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        eprintln!("[{}] {}: {}", tag, record.module_path().unwrap_or("?"), record.args());
    }

    fn flush(&self) {}
}

fn init_logging(verbosity: usize, dump: bool) {
    let mut level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    if dump {
        level = level.max(LevelFilter::Info);
    }
    if log::set_logger(Box::leak(Box::new(StderrLogger))).is_ok() {
        log::set_max_level(level);
    }
}

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };
    init_logging(config.verbosity, config.sim.dump);

    if let Err(e) = run(&config) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn print_help(program: &str) {
    eprintln!("Paging simulator - Runs processes over shared demand-paged memory");
    eprintln!();
    eprintln!("Usage: {} [OPTIONS] <workload_file> [output_file]", program);
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  workload_file - 'proc <name> <priority>' lines, each followed by its instructions");
    eprintln!("  output_file   - Output file for values read (stdout if omitted)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --frames N   RAM frames (default {})", SimConfig::default().ram_frames);
    eprintln!("  --swap N     Swap slots (default {})", SimConfig::default().swap_slots);
    eprintln!("  --cpus N     Worker threads (default {})", SimConfig::default().cpus);
    eprintln!("  --slice N    Instructions per dispatch (default {})", SimConfig::default().time_slice);
    eprintln!("  --queue N    Ready queue capacity (default {})", SimConfig::default().queue_capacity);
    eprintln!("  --prio N     Priority levels (default {})", SimConfig::default().max_prio);
    eprintln!("  --single     Use a single priority queue");
    eprintln!("  --mlq        Use multi-level queues (default)");
    eprintln!("  --dump       Log page table and RAM after every memory syscall");
    eprintln!("  -v, -vv      Log syscalls, then page faults and dispatches");
    eprintln!("  -h, --help   Print this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} workload.txt", program);
    eprintln!("  {} --frames 4 --cpus 1 -vv workload.txt output.txt", program);
}

fn parse_count(flag: &str, value: Option<&String>) -> Result<usize, String> {
    let value = value.ok_or_else(|| format!("Option {} needs a value", flag))?;
    value.parse().map_err(|_| format!("Invalid value for {}: {}", flag, value))
}

fn parse_args() -> Result<Config, String> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("paging-sim");

    let mut sim = SimConfig::default();
    let mut verbosity = 0;
    let mut positional: Vec<&String> = Vec::new();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help(program);
                process::exit(0);
            }
            "-v" | "--verbose" => verbosity += 1,
            "-vv" => verbosity += 2,
            "--frames" => sim.ram_frames = parse_count(arg, iter.next())?,
            "--swap" => sim.swap_slots = parse_count(arg, iter.next())?,
            "--cpus" => sim.cpus = parse_count(arg, iter.next())?,
            "--slice" => sim.time_slice = parse_count(arg, iter.next())?,
            "--queue" => sim.queue_capacity = parse_count(arg, iter.next())?,
            "--prio" => sim.max_prio = parse_count(arg, iter.next())?,
            "--single" => sim.policy = SchedPolicy::Priority,
            "--mlq" => sim.policy = SchedPolicy::MultiLevel,
            "--dump" => sim.dump = true,
            _ if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}\nUse --help for usage information.", arg));
            }
            _ => positional.push(arg),
        }
    }

    if positional.is_empty() || positional.len() > 2 {
        print_help(program);
        return Err(format!("\nError: Expected 1 or 2 arguments, got {}", positional.len()));
    }
    sim.validate()?;

    Ok(Config {
        workload_file: positional[0].clone(),
        output_file: positional.get(1).map(|s| s.to_string()),
        verbosity,
        sim,
    })
}

/// Main logic separated from main() for cleaner error handling
fn run(config: &Config) -> anyhow::Result<()> {
    let sim = &config.sim;
    let workload = Workload::from_file(&config.workload_file)
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("loading {}", config.workload_file))?;

    let mram = MemPhy::shared(sim.ram_frames);
    let mswp = MemPhy::shared(sim.swap_slots);
    let sched = Scheduler::init(sim);
    info!(
        "{} processes, {} frames, {} swap slots, {} cpus, {:?}",
        workload.procs.len(),
        sim.ram_frames,
        sim.swap_slots,
        sim.cpus,
        sched.policy()
    );

    let mut procs = Vec::new();
    for (pid, spec) in workload.procs.into_iter().enumerate() {
        let proc = Arc::new(Pcb::new(
            pid as u32 + 1,
            spec.name,
            spec.priority,
            spec.code,
            sim,
            mram.clone(),
            mswp.clone(),
        ));
        match sched.admit(proc.clone()) {
            Ok(()) => procs.push(proc),
            Err(e) => warn!("pid {} ({}) not admitted: {}", proc.pid(), proc.path(), e),
        }
    }

    let dispatches: usize = thread::scope(|scope| {
        let workers: Vec<_> = (0..sim.cpus)
            .map(|id| {
                let sched = &sched;
                let slice = sim.time_slice;
                scope.spawn(move || cpu_routine(id, sched, slice))
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap_or(0)).sum()
    });

    let leftover = sched.shutdown();
    if !leftover.is_empty() {
        warn!("{} processes still admitted at shutdown", leftover.len());
    }

    let killed = procs.iter().filter(|p| p.is_killed()).count();
    eprintln!("=== Summary ===");
    eprintln!("Processes run:     {}", procs.len());
    eprintln!("Killed:            {}", killed);
    eprintln!("Dispatches:        {}", dispatches);
    eprintln!("Free frames:       {}/{}", lock(&mram).free_count(), sim.ram_frames);
    eprintln!("Free swap slots:   {}/{}", lock(&mswp).free_count(), sim.swap_slots);

    let lines: Vec<String> = procs
        .iter()
        .flat_map(|p| {
            let prefix = format!("pid {} ({})", p.pid(), p.path());
            p.output().into_iter().map(move |line| format!("{}: {}", prefix, line))
        })
        .collect();

    match &config.output_file {
        Some(path) => {
            write_results(path, &lines).map_err(|e| anyhow!(e))?;
            info!("Results written to: {}", path);
        }
        None => {
            for line in &lines {
                println!("{}", line);
            }
        }
    }
    Ok(())
}
