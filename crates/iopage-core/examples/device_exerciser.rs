//! Builds a bus with the full device set and runs a short exercise pass:
//! arithmetic through the EAE, characters through the serial silo, and an
//! interrupt drain at the end.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use iopage_core::{Bus, Eae, RasterDisplay, RxChar, SerialController, VectorDisplay, RX_VALID};
use proptest as _;
use rstest as _;

const EAE_MQ: u32 = 0o777304;
const EAE_MUL: u32 = 0o777306;
const EAE_SCSR: u32 = 0o777310;
const SLC_SCR: u32 = 0o760020;
const SLC_NRCR: u32 = 0o760022;
const SLC_SSR: u32 = 0o760036;

fn main() {
    env_logger::init();

    let mut bus = Bus::new();
    let eae = Arc::new(Mutex::new(Eae::new()));
    bus.install(eae).expect("install EAE");
    let (slc, rx_tx) = SerialController::new();
    bus.install(Arc::new(Mutex::new(slc))).expect("install serial");
    bus.install(Arc::new(Mutex::new(VectorDisplay::new())))
        .expect("install vector display");
    bus.install(Arc::new(Mutex::new(RasterDisplay::new())))
        .expect("install raster display");

    println!("installed devices:");
    for line in bus.resource_map() {
        println!("  {line}");
    }

    // 123 * 3, octal in and out.
    bus.dato(EAE_MQ, 0o173).unwrap();
    bus.dato(EAE_MUL, 3).unwrap();
    println!(
        "EAE: 173 * 3 = {:06o}:{:06o}, SCSR {:06o}",
        bus.dati(0o777302).unwrap(),
        bus.dati(EAE_MQ).unwrap(),
        bus.dati(EAE_SCSR).unwrap()
    );

    // Feed a few characters and let the worker move them into the silo.
    bus.dato(SLC_SCR, iopage_core::SCR_RX_INT_ENABLE).unwrap();
    for ch in *b"ok" {
        rx_tx.send(RxChar::clean(0, ch)).unwrap();
    }
    std::thread::sleep(Duration::from_millis(100));
    println!("serial: SSR {:06o}", bus.dati(SLC_SSR).unwrap());

    // Prime the output latch, then drain.
    let _ = bus.dati(SLC_NRCR).unwrap();
    loop {
        let word = bus.dati(SLC_NRCR).unwrap();
        if word & RX_VALID == 0 {
            break;
        }
        println!("serial: received {:#04x}", word & 0xFF);
    }

    while let Some(intr) = bus.take_interrupt() {
        println!(
            "interrupt: {} vector {:03o} level {}",
            intr.device, intr.vector, intr.level
        );
    }

    bus.shutdown();
}
