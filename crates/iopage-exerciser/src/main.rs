//! CLI entry point for the device exerciser.
//!
//! Installs the full device set on a fresh bus and runs scripted rounds of
//! register, silo, and interrupt checks against it.

use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::info;

use iopage_core::devices::serial::RxSender;
use iopage_core::{
    Bus, Eae, RasterDisplay, RxChar, SerialController, VectorDisplay, RX_VALID,
    SCR_RX_INT_ENABLE, SERIAL_INTR_VECTOR,
};

const HELP_TEXT: &str = "Usage: iopage-exerciser [--rounds <n>] [--list] [--help]";

const EAE_AC: u32 = 0o777302;
const EAE_MQ: u32 = 0o777304;
const EAE_MUL: u32 = 0o777306;
const SLC_SCR: u32 = 0o760020;
const SLC_NRCR: u32 = 0o760022;

#[derive(Debug, PartialEq, Eq)]
struct CliArgs {
    rounds: u32,
    list: bool,
}

#[derive(Debug)]
enum ParseResult {
    Args(CliArgs),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut rounds = 1_u32;
    let mut list = false;

    while let Some(arg) = args.next() {
        if arg == "--help" {
            return Ok(ParseResult::Help);
        }
        if arg == "--list" {
            list = true;
            continue;
        }
        if arg == "--rounds" {
            let value = args
                .next()
                .ok_or_else(|| String::from("missing value for --rounds"))?;
            rounds = value
                .to_string_lossy()
                .parse()
                .map_err(|_| format!("invalid round count: {}", value.to_string_lossy()))?;
            continue;
        }
        return Err(format!("unknown option: {}", arg.to_string_lossy()));
    }

    Ok(ParseResult::Args(CliArgs { rounds, list }))
}

/// One scripted pass over the installed devices. Returns the number of
/// failed checks.
fn exercise_round(bus: &mut Bus, rx_tx: &RxSender, round: u32) -> u32 {
    let mut failures = 0;
    let mut check = |label: &str, ok: bool| {
        if !ok {
            eprintln!("round {round}: check failed: {label}");
            failures += 1;
        }
    };

    // Multiply two round-derived operands and verify the 32-bit product.
    let a = (round % 0o177) as u16 + 1;
    let b = ((round * 7) % 0o177) as u16 + 1;
    bus.dato(EAE_MQ, a).unwrap();
    bus.dato(EAE_MUL, b).unwrap();
    let product =
        (u32::from(bus.dati(EAE_AC).unwrap()) << 16) | u32::from(bus.dati(EAE_MQ).unwrap());
    check("EAE product", product == u32::from(a) * u32::from(b));

    // Push a line of characters through the silo and read them back.
    bus.dato(SLC_SCR, SCR_RX_INT_ENABLE).unwrap();
    let message = b"exercise";
    for ch in message {
        rx_tx.send(RxChar::clean(0, *ch)).unwrap();
    }
    let deadline = Instant::now() + Duration::from_secs(2);
    let _ = bus.dati(SLC_NRCR).unwrap();
    let mut received = Vec::new();
    while received.len() < message.len() && Instant::now() < deadline {
        let word = bus.dati(SLC_NRCR).unwrap();
        if word & RX_VALID == 0 {
            std::thread::sleep(Duration::from_millis(5));
            continue;
        }
        received.push((word & 0xFF) as u8);
    }
    check("silo round trip", received == message);

    // The alarm level defaults to zero, so the first character already
    // crossed it and requested the receive interrupt.
    let mut saw_receive_interrupt = false;
    while let Some(intr) = bus.take_interrupt() {
        if intr.vector == SERIAL_INTR_VECTOR {
            saw_receive_interrupt = true;
        }
    }
    check("receive interrupt", saw_receive_interrupt);

    failures
}

fn run(args: &CliArgs) -> Result<(), String> {
    let mut bus = Bus::new();
    bus.install(Arc::new(Mutex::new(Eae::new())))
        .map_err(|e| e.to_string())?;
    let (slc, rx_tx) = SerialController::new();
    bus.install(Arc::new(Mutex::new(slc)))
        .map_err(|e| e.to_string())?;
    bus.install(Arc::new(Mutex::new(VectorDisplay::new())))
        .map_err(|e| e.to_string())?;
    bus.install(Arc::new(Mutex::new(RasterDisplay::new())))
        .map_err(|e| e.to_string())?;

    if args.list {
        for line in bus.resource_map() {
            println!("{line}");
        }
    }

    let mut failures = 0;
    for round in 0..args.rounds {
        info!("starting round {round}");
        failures += exercise_round(&mut bus, &rx_tx, round);
        bus.set_init(true);
        bus.set_init(false);
    }
    bus.shutdown();

    if failures == 0 {
        println!("{} rounds passed", args.rounds);
        Ok(())
    } else {
        Err(format!("{failures} checks failed"))
    }
}

fn main() {
    env_logger::init();
    match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{HELP_TEXT}");
        }
        Ok(ParseResult::Args(args)) => {
            if let Err(error) = run(&args) {
                eprintln!("error: {error}");
                std::process::exit(1);
            }
        }
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{HELP_TEXT}");
            std::process::exit(1);
        }
    }
}
