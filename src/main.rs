use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hotwatch::notify::Event;
use hotwatch::{
    blocking::{Flow, Hotwatch},
    EventKind,
};
use miette::{bail, IntoDiagnostic, Result};

use chasm::{Air, Quirks, Vm, DEFAULT_ORIGIN};

/// Chasm is an assembler, disassembler and headless interpreter for CHIP-8 programs.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create binary `.ch8` image from a `.c8s` source file
    Assemble {
        /// `.c8s` file to assemble
        name: PathBuf,
        /// Destination to output `.ch8` file
        dest: Option<PathBuf>,
        /// Address the program will be loaded at
        #[arg(short, long, default_value = "0x200", value_parser = parse_addr)]
        origin: u16,
    },
    /// Check a `.c8s` file without outputting binary
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Print the disassembly of a binary `.ch8` image
    Disasm {
        /// `.ch8` file to disassemble
        name: PathBuf,
        /// Address the image is loaded at
        #[arg(short, long, default_value = "0x200", value_parser = parse_addr)]
        origin: u16,
    },
    /// Run a `.c8s` source or `.ch8` image without a window and dump the final machine state
    Run {
        /// `.c8s` or `.ch8` file to run
        name: PathBuf,
        /// Maximum number of instructions to execute
        #[arg(short, long, default_value_t = 1000)]
        cycles: usize,
        /// Instructions per frame; timers tick once per frame
        #[arg(long, default_value_t = 10)]
        ipf: usize,
        /// Hex keys fed to the program, in order, whenever it waits for a key
        #[arg(short, long, value_delimiter = ',', value_parser = parse_key)]
        press: Vec<u8>,
        /// Comma separated list of behaviour changes (`shift`, `bcd`)
        #[arg(long, env = "CHASM_QUIRKS", default_value = "")]
        quirks: Quirks,
        /// Seed for `RND`, for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Place a watch on a `.c8s` file to receive constant assembler updates
    Watch {
        /// `.c8s` file to watch
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(chasm::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    let Some(command) = args.command else {
        println!("\n~ chasm v{VERSION} - Copyright (c) 2024 Artemis Rosman ~");
        println!("{}", LOGO.truecolor(120, 200, 160).bold());
        println!("{SHORT_INFO}");
        std::process::exit(0);
    };

    match command {
        Command::Assemble { name, dest, origin } => {
            file_message(Green, "Assembling", &name);
            let contents = fs::read_to_string(&name).into_diagnostic()?;
            let air = assemble(&contents, origin)?;

            let out_file_name = match dest {
                Some(dest) => dest,
                None => match name.with_extension("ch8").file_name() {
                    Some(file_name) => file_name.into(),
                    None => bail!("Cannot derive an output name from {}", name.display()),
                },
            };
            fs::write(&out_file_name, air.emit()).into_diagnostic()?;

            message(Green, "Finished", "emit binary");
            file_message(Green, "Saved", &out_file_name);
            Ok(())
        }
        Command::Check { name } => {
            file_message(Green, "Checking", &name);
            let contents = fs::read_to_string(&name).into_diagnostic()?;
            let _ = assemble(&contents, DEFAULT_ORIGIN)?;
            message(Green, "Success", "no errors found!");
            Ok(())
        }
        Command::Disasm { name, origin } => {
            let image = fs::read(&name).into_diagnostic()?;
            print!("{}", chasm::disassemble(&image, origin));
            Ok(())
        }
        Command::Run {
            name,
            cycles,
            ipf,
            press,
            quirks,
            seed,
        } => {
            let options = RunOptions {
                cycles,
                ipf: ipf.max(1),
                presses: press.into(),
                quirks,
                seed,
            };
            run(&name, options)
        }
        Command::Watch { name } => {
            if !name.exists() {
                bail!("File does not exist. Exiting...")
            }
            // Vim breaks if watching a single file
            let folder_path = match name.parent() {
                Some(pth) if pth.is_dir() => pth.to_path_buf(),
                _ => Path::new(".").to_path_buf(),
            };

            // Clear screen and move cursor to top left
            print!("\x1B[2J\x1B[2;1H");
            file_message(Green, "Watching", &name);
            message(Cyan, "Help", "press CTRL+C to exit");

            let mut watcher =
                Hotwatch::new_with_custom_delay(Duration::from_millis(500)).into_diagnostic()?;

            watcher
                .watch(folder_path, move |event: Event| match event.kind {
                    // Watch remove for vim changes
                    EventKind::Modify(_) | EventKind::Remove(_) => {
                        // Clear screen
                        print!("\x1B[2J\x1B[2;1H");
                        file_message(Green, "Watching", &name);
                        message(Green, "Re-checking", "file change detected");
                        message(Cyan, "Help", "press CTRL+C to exit");

                        // Makes reruns more obvious
                        sleep(Duration::from_millis(50));

                        let contents = match fs::read_to_string(&name) {
                            Ok(cts) => cts,
                            Err(e) => {
                                eprintln!("{e}. Exiting...");
                                std::process::exit(1)
                            }
                        };
                        match assemble(&contents, DEFAULT_ORIGIN) {
                            Ok(_) => message(Green, "Success", "no errors found!"),
                            Err(e) => println!("\n{:?}", e),
                        }
                        Flow::Continue
                    }
                    _ => Flow::Continue,
                })
                .into_diagnostic()?;
            watcher.run();
            Ok(())
        }
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message<S>(color: MsgColor, left: S, right: S)
where
    S: Colorize + std::fmt::Display,
{
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

struct RunOptions {
    cycles: usize,
    ipf: usize,
    presses: VecDeque<u8>,
    quirks: Quirks,
    seed: Option<u64>,
}

fn run(name: &Path, mut opts: RunOptions) -> Result<()> {
    let image = match name.extension().and_then(|ext| ext.to_str()) {
        Some("ch8") => fs::read(name).into_diagnostic()?,
        Some("c8s" | "asm" | "s") => {
            file_message(MsgColor::Green, "Assembling", name);
            let contents = fs::read_to_string(name).into_diagnostic()?;
            assemble(&contents, DEFAULT_ORIGIN)?.emit()
        }
        Some(_) => bail!("File has unknown extension. Exiting..."),
        None => bail!("File has no extension. Exiting..."),
    };

    let mut vm = Vm::with_quirks(opts.quirks);
    if let Some(seed) = opts.seed {
        vm.seed(seed);
    }
    vm.load_program(&image, DEFAULT_ORIGIN);
    vm.set_ip(DEFAULT_ORIGIN);

    message(MsgColor::Green, "Running", "emitted binary");
    let mut held: Option<u8> = None;
    let mut executed = 0;
    let mut halted = false;
    while executed < opts.cycles {
        if vm.is_waiting_for_key() {
            let Some(key) = opts.presses.pop_front() else {
                message(MsgColor::Cyan, "Waiting", "program wants a key, none left to press");
                break;
            };
            vm.key_down(key);
            held = Some(key);
        }

        let ip = vm.ip();
        vm.step();
        executed += 1;

        if executed % opts.ipf == 0 {
            vm.decrement_delay_timer();
            vm.decrement_sound_timer();
            // Keys are held for one frame
            if let Some(key) = held.take() {
                vm.key_up(key);
            }
        }
        // `JP $` is the customary way to stop
        if vm.ip() == ip && !vm.is_waiting_for_key() {
            halted = true;
            break;
        }
    }

    let status = if halted { "Halted" } else { "Finished" };
    message(MsgColor::Green, status, &format!("after {executed} cycles"));
    print!("{}", vm.display().render());
    print_registers(&vm);
    Ok(())
}

fn print_registers(vm: &Vm) {
    let regs: Vec<String> = (0..16)
        .map(|idx| format!("V{idx:X}={:02X}", vm.v(idx)))
        .collect();
    println!("{}", regs.join(" "));
    println!(
        "I={:03X} IP={:03X} SP={:X} DT={:02X} ST={:02X}",
        vm.i(),
        vm.ip(),
        vm.sp(),
        vm.dt(),
        vm.st()
    );
}

/// Return assembly intermediate representation of source file for further processing.
/// Warnings are printed here since they never stop assembly.
fn assemble(contents: &str, origin: u16) -> Result<Air> {
    let air = chasm::assemble_at(contents, origin)?;
    for warning in air.warnings() {
        eprintln!("{warning:?}");
    }
    Ok(air)
}

fn parse_addr(arg: &str) -> Result<u16, String> {
    let value = match arg.strip_prefix("0x").or(arg.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => arg.parse(),
    }
    .map_err(|e| format!("invalid address '{arg}': {e}"))?;
    if value > 0xFFF {
        return Err(format!("address '{arg}' is outside the 4KB address space"));
    }
    Ok(value)
}

fn parse_key(arg: &str) -> Result<u8, String> {
    match u8::from_str_radix(arg.trim(), 16) {
        Ok(key) if key < 16 => Ok(key),
        _ => Err(format!("invalid key '{arg}', expected a hex digit 0-F")),
    }
}

const LOGO: &str = r#"
        __
  _____/ /_  ____ __________ ___
 / ___/ __ \/ __ `/ ___/ __ `__ \
/ /__/ / / / /_/ (__  ) / / / / /
\___/_/ /_/\__,_/____/_/ /_/ /_/"#;

const SHORT_INFO: &str = r"
Welcome to chasm, an assembler and interpreter toolchain for CHIP-8 programs.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
