//! Arithmetic element suite: concrete operation scenarios plus property
//! coverage of the multiply, divide, shift, and status-recompute
//! contracts, driven end to end through bus cycles.

use std::sync::{Arc, Mutex};

use iopage_core::{Bus, Eae, SR_ACM1, SR_ACZ, SR_MQZ, SR_N, SR_NXV, SR_SXT, SR_Z};
use proptest::prelude::*;
use rstest::rstest;

use env_logger as _;

const DIV: u32 = 0o777300;
const AC: u32 = 0o777302;
const MQ: u32 = 0o777304;
const MUL: u32 = 0o777306;
const SCSR: u32 = 0o777310;
const NOR: u32 = 0o777312;
const LSH: u32 = 0o777314;
const ASH: u32 = 0o777316;

fn rig() -> (Bus, Arc<Mutex<Eae>>) {
    let eae = Arc::new(Mutex::new(Eae::new()));
    let mut bus = Bus::new();
    bus.install(eae.clone()).expect("install EAE");
    (bus, eae)
}

fn load(bus: &Bus, ac: u16, mq: u16) {
    // MQ first: loading MQ sign-extends through AC.
    bus.dato(MQ, mq).unwrap();
    bus.dato(AC, ac).unwrap();
}

fn state(eae: &Arc<Mutex<Eae>>) -> (u16, u16, u8, u8) {
    let dev = eae.lock().unwrap();
    (dev.ac(), dev.mq(), dev.sc(), dev.sr())
}

fn sxt32(ac: u16, mq: u16) -> i64 {
    i64::from((u32::from(ac) << 16 | u32::from(mq)) as i32)
}

#[rstest]
#[case::small_positive(0o000007, 0o000005, 0o000000, 0o000043)]
#[case::negative_multiplier(0o000003, 0o177775, 0o177777, 0o177767)]
#[case::zero(0o000000, 0o123456, 0o000000, 0o000000)]
#[case::large(0o077777, 0o077777, 0o037777, 0o000001)]
fn multiply_cases(#[case] mq: u16, #[case] mul: u16, #[case] exp_ac: u16, #[case] exp_mq: u16) {
    let (bus, eae) = rig();
    load(&bus, 0, mq);
    bus.dato(MUL, mul).unwrap();
    let (ac, mq, sc, _sr) = state(&eae);
    assert_eq!(ac, exp_ac);
    assert_eq!(mq, exp_mq);
    assert_eq!(sc, 0);
}

#[test]
fn multiply_sets_status_for_positive_product() {
    let (bus, eae) = rig();
    load(&bus, 0, 0o000007);
    bus.dato(MUL, 0o000005).unwrap();
    let (_, _, _, sr) = state(&eae);
    assert_ne!(sr & SR_ACZ, 0, "high half is zero");
    assert_eq!(sr & SR_N, 0, "product is positive");
}

#[test]
fn multiply_sets_status_for_negative_product() {
    let (bus, eae) = rig();
    load(&bus, 0, 0o000003);
    bus.dato(MUL, 0o177775).unwrap();
    let (ac, mq, _, sr) = state(&eae);
    assert_eq!(ac, 0o177777);
    assert_eq!(mq, 0o177767);
    assert_ne!(sr & SR_N, 0);
    assert_ne!(sr & SR_NXV, 0);
    assert_ne!(sr & SR_ACM1, 0);
    assert_ne!(sr & SR_SXT, 0);
}

#[test]
fn divide_produces_quotient_and_remainder() {
    let (bus, eae) = rig();
    load(&bus, 0, 0o000144); // 100
    bus.dato(DIV, 0o000007).unwrap();
    let (ac, mq, sc, sr) = state(&eae);
    assert_eq!(mq, 0o000016, "quotient 14");
    assert_eq!(ac, 0o000002, "remainder 2");
    assert_eq!(sc, 0);
    assert_eq!(sr & SR_NXV, 0);
}

#[test]
fn divide_overflow_stops_after_one_step() {
    let (bus, eae) = rig();
    load(&bus, 0o000001, 0);
    bus.dato(DIV, 0o000001).unwrap();
    let (_, mq, sc, sr) = state(&eae);
    assert_eq!(sc, 15);
    assert_ne!(sr & SR_NXV, 0);
    // Signs of dividend and divisor match, so the trial step bit is 1.
    assert_eq!(mq & 1, 1);
}

#[test]
fn divide_by_zero_takes_the_overflow_path() {
    let (bus, eae) = rig();
    load(&bus, 0, 0o000144);
    bus.dato(DIV, 0).unwrap();
    let (_, _, sc, sr) = state(&eae);
    assert_eq!(sc, 15);
    assert_ne!(sr & SR_NXV, 0);
}

#[test]
fn normalize_shifts_until_top_bits_differ() {
    let (bus, eae) = rig();
    load(&bus, 0o000001, 0);
    bus.dato(NOR, 0).unwrap();
    let (ac, _, sc, _) = state(&eae);
    assert_eq!(sc, 14);
    assert_eq!(ac, 0o040000);
    // NOR reads back the shift count.
    assert_eq!(bus.dati(NOR).unwrap(), 14);
    assert_eq!(bus.dati(SCSR).unwrap() & 0xFF, 14);
}

#[rstest]
#[case::left_four(0o001234, 0o000000, 0o000004, 0o012340, 0o000000)]
#[case::left_across_words(0o000000, 0o100000, 0o000001, 0o000001, 0o000000)]
#[case::right_one(0o000002, 0o000000, 0o000077, 0o000001, 0o000000)]
#[case::right_sixteen(0o000001, 0o000000, 0o000060, 0o000000, 0o000001)]
fn logical_shift_cases(
    #[case] ac0: u16,
    #[case] mq0: u16,
    #[case] count: u16,
    #[case] exp_ac: u16,
    #[case] exp_mq: u16,
) {
    let (bus, eae) = rig();
    load(&bus, ac0, mq0);
    bus.dato(LSH, count).unwrap();
    let (ac, mq, sc, _) = state(&eae);
    assert_eq!((ac, mq), (exp_ac, exp_mq));
    assert_eq!(sc, 0);
}

#[test]
fn arithmetic_right_shift_replicates_the_sign() {
    let (bus, eae) = rig();
    load(&bus, 0o100000, 0); // negative accumulator
    bus.dato(ASH, 0o000074).unwrap(); // right by 4
    let (ac, mq, _, _) = state(&eae);
    assert_eq!(ac, 0o174000);
    assert_eq!(mq, 0);
}

#[test]
fn arithmetic_left_shift_keeps_the_sign_bit() {
    let (bus, eae) = rig();
    load(&bus, 0o100000, 0o000001);
    bus.dato(ASH, 0o000001).unwrap();
    let (ac, mq, _, _) = state(&eae);
    // Bit 31 stays put while the low 31 bits shift.
    assert_eq!(ac, 0o100000);
    assert_eq!(mq, 0o000002);
}

#[test]
fn scsr_read_publishes_recomputed_status() {
    let (bus, _eae) = rig();
    load(&bus, 0, 0);
    let scsr = bus.dati(SCSR).unwrap();
    let sr = (scsr >> 8) as u8;
    assert_ne!(sr & SR_ACZ, 0);
    assert_ne!(sr & SR_MQZ, 0);
    assert_ne!(sr & SR_Z, 0);
    assert_ne!(sr & SR_SXT, 0);
}

#[test]
fn byte_lane_writes_sign_extend_operands() {
    let (bus, eae) = rig();
    load(&bus, 0, 3);
    bus.dato_byte_low(MUL, 0x00FD).unwrap(); // -3 as a byte
    let (ac, mq, _, _) = state(&eae);
    assert_eq!(ac, 0xFFFF);
    assert_eq!(mq, 0xFFF7);
}

proptest! {
    #[test]
    fn property_multiply_is_signed_16x16(ac0 in any::<u16>(), mq0 in any::<u16>(), mul in any::<u16>()) {
        let (bus, eae) = rig();
        load(&bus, ac0, mq0);
        bus.dato(MUL, mul).unwrap();
        let (ac, mq, sc, _) = state(&eae);
        let expected = i64::from(mq0 as i16) * i64::from(mul as i16);
        prop_assert_eq!(sxt32(ac, mq), expected);
        prop_assert_eq!(sc, 0);
    }

    #[test]
    fn property_divide_satisfies_euclid_when_it_fits(ac0 in any::<u16>(), mq0 in any::<u16>(), div in any::<u16>()) {
        let dividend = sxt32(ac0, mq0);
        let divisor = i64::from(div as i16);
        prop_assume!(divisor != 0);
        prop_assume!((dividend.unsigned_abs() >> 16) < divisor.unsigned_abs());
        prop_assume!((-32768..=32767).contains(&(dividend / divisor)));

        let (bus, eae) = rig();
        load(&bus, ac0, mq0);
        bus.dato(DIV, div).unwrap();
        let (ac, mq, sc, sr) = state(&eae);

        let quotient = i64::from(mq as i16);
        let remainder = i64::from(ac as i16);
        prop_assert_eq!(quotient * divisor + remainder, dividend);
        prop_assert!(remainder.abs() < divisor.abs());
        if remainder != 0 {
            prop_assert_eq!(remainder.signum(), dividend.signum());
        }
        prop_assert_eq!(sc, 0);
        // The overflow bit reads as N xor V: set exactly when the
        // quotient is negative, since V stays clear here.
        prop_assert_eq!(sr & SR_NXV != 0, quotient < 0);
    }

    #[test]
    fn property_status_flags_track_accumulator(
        ac0 in any::<u16>(),
        mq0 in any::<u16>(),
        operand in any::<u16>(),
        op in 0_u8..5,
    ) {
        let (bus, eae) = rig();
        load(&bus, ac0, mq0);
        let addr = [MUL, DIV, NOR, LSH, ASH][usize::from(op)];
        bus.dato(addr, operand).unwrap();
        let (ac, mq, sc, sr) = state(&eae);

        prop_assert!(sc < 64, "SC {sc} out of range");
        prop_assert_eq!(sr & SR_MQZ != 0, mq == 0);
        prop_assert_eq!(sr & SR_ACZ != 0, ac == 0);
        prop_assert_eq!(sr & SR_ACM1 != 0, ac == 0xFFFF);
        prop_assert_eq!(sr & SR_Z != 0, ac == 0 && mq == 0);

        // The published registers mirror the internal state.
        prop_assert_eq!(bus.dati(AC).unwrap(), ac);
        prop_assert_eq!(bus.dati(MQ).unwrap(), mq);
        prop_assert_eq!(bus.dati(SCSR).unwrap(), (u16::from(sr) << 8) | u16::from(sc));
        prop_assert_eq!(bus.dati(NOR).unwrap(), u16::from(sc));
    }

    #[test]
    fn property_shift_count_zero_is_stable(ac0 in any::<u16>(), mq0 in any::<u16>(), arithmetic in any::<bool>()) {
        let addr = if arithmetic { ASH } else { LSH };
        let (bus, eae) = rig();
        load(&bus, ac0, mq0);
        bus.dato(addr, 0).unwrap();
        let first = state(&eae);
        bus.dato(addr, 0).unwrap();
        let second = state(&eae);
        prop_assert_eq!(first, second);
        prop_assert_eq!(second.2, 0, "SC clears");
    }

    #[test]
    fn property_left_then_right_shift_round_trips(value in 0_u32..=0x7FFF_FFFF, n in 1_u32..16) {
        // Keep the top bits clear so the left shift loses nothing.
        let value = value >> (n + 1);
        let ac0 = (value >> 16) as u16;
        let mq0 = (value & 0xFFFF) as u16;

        let (bus, eae) = rig();
        load(&bus, ac0, mq0);
        bus.dato(LSH, n as u16).unwrap();
        {
            let dev = eae.lock().unwrap();
            prop_assert_eq!(dev.sr() & SR_NXV, 0, "no bits may be lost");
        }
        bus.dato(LSH, (64 - n) as u16).unwrap();
        let (ac, mq, _, _) = state(&eae);
        prop_assert_eq!((ac, mq), (ac0, mq0));
    }
}
