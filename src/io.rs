use std::fs;
use std::path::Path;

use crate::proc::Instruction;

/// One process of a workload file
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProcSpec {
    pub name: String,
    pub priority: usize,
    pub code: Vec<Instruction>,
}

/// Parsed workload file
///
/// ```text
/// # comment
/// proc s0 1
/// alloc 300 0
/// write 100 0 20
/// read 0 20
/// free 0
/// proc s1 0
/// calc
/// ```
#[derive(Debug, Default)]
pub struct Workload {
    pub procs: Vec<ProcSpec>,
}

impl Workload {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read workload file: {}", e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let mut procs: Vec<ProcSpec> = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let lineno = idx + 1;
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();

            if tokens[0] == "proc" {
                procs.push(Self::parse_proc_line(&tokens, lineno)?);
                continue;
            }
            let ins = Self::parse_instruction(&tokens, lineno)?;
            match procs.last_mut() {
                Some(spec) => spec.code.push(ins),
                None => return Err(format!("Line {}: instruction before any proc line", lineno)),
            }
        }

        if procs.is_empty() {
            return Err("Workload file defines no process".to_string());
        }
        Ok(Workload { procs })
    }

    fn parse_proc_line(tokens: &[&str], lineno: usize) -> Result<ProcSpec, String> {
        if tokens.len() != 3 {
            return Err(format!("Line {}: expected 'proc <name> <priority>'", lineno));
        }
        Ok(ProcSpec {
            name: tokens[1].to_string(),
            priority: parse_num(tokens[2], "priority", lineno)?,
            code: Vec::new(),
        })
    }

    fn parse_instruction(tokens: &[&str], lineno: usize) -> Result<Instruction, String> {
        let args = &tokens[1..];
        let expect = |n: usize| -> Result<(), String> {
            if args.len() == n {
                Ok(())
            } else {
                Err(format!("Line {}: '{}' takes {} arguments, got {}", lineno, tokens[0], n, args.len()))
            }
        };

        let ins = match tokens[0] {
            "calc" => {
                expect(0)?;
                Instruction::Calc
            }
            "alloc" => {
                expect(2)?;
                Instruction::Alloc {
                    size: parse_num(args[0], "size", lineno)?,
                    reg: parse_num(args[1], "region", lineno)?,
                }
            }
            "free" => {
                expect(1)?;
                Instruction::Free { reg: parse_num(args[0], "region", lineno)? }
            }
            "read" => {
                expect(2)?;
                Instruction::Read {
                    reg: parse_num(args[0], "region", lineno)?,
                    offset: parse_num(args[1], "offset", lineno)?,
                }
            }
            "write" => {
                expect(3)?;
                Instruction::Write {
                    value: parse_byte(args[0], lineno)?,
                    reg: parse_num(args[1], "region", lineno)?,
                    offset: parse_num(args[2], "offset", lineno)?,
                }
            }
            "killall" => {
                expect(1)?;
                Instruction::KillAll { reg: parse_num(args[0], "region", lineno)? }
            }
            other => return Err(format!("Line {}: unknown instruction '{}'", lineno, other)),
        };
        Ok(ins)
    }
}

fn parse_num(token: &str, what: &str, lineno: usize) -> Result<usize, String> {
    token.parse().map_err(|_| format!("Line {}: invalid {}: {}", lineno, what, token))
}

/// A byte value; negative values are taken as signed bytes, so -1 is 0xff.
fn parse_byte(token: &str, lineno: usize) -> Result<u8, String> {
    let v: i16 = token.parse().map_err(|_| format!("Line {}: invalid value: {}", lineno, token))?;
    match v {
        -128..=-1 => Ok(v as i8 as u8),
        0..=255 => Ok(v as u8),
        _ => Err(format!("Line {}: value {} does not fit in a byte", lineno, v)),
    }
}

pub fn write_results<P: AsRef<Path>>(path: P, lines: &[String]) -> Result<(), String> {
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(path.as_ref(), content).map_err(|e| format!("Failed to write output file: {}", e))
}
