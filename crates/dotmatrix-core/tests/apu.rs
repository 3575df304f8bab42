use dotmatrix_core::apu::Apu;

const CPU_HZ: u32 = 4_194_304;
const SAMPLE_RATE: u32 = 44_100;

/// Program channel 1 as a plain tone: duty 2, full volume, no envelope, no
/// length cutoff.
fn tone_on_ch1(apu: &mut Apu, period: u16) {
    apu.write_reg(0xFF26, 0x80);
    apu.write_reg(0xFF24, 0x77);
    apu.write_reg(0xFF25, 0x11); // ch1 both sides
    apu.write_reg(0xFF10, 0x00); // sweep off
    apu.write_reg(0xFF11, 0x80); // duty 2
    apu.write_reg(0xFF12, 0xF0); // volume 15, envelope off
    apu.write_reg(0xFF13, (period & 0xFF) as u8);
    apu.write_reg(0xFF14, 0x80 | ((period >> 8) as u8 & 0x07));
}

fn drain_left_samples(apu: &Apu, max: usize) -> Vec<f32> {
    let ring = apu.ring();
    let mut interleaved = vec![0.0f32; max * 2];
    let got = ring.read(&mut interleaved);
    interleaved[..got].chunks(2).map(|frame| frame[0]).collect()
}

#[test]
fn pulse_tone_frequency_within_one_percent() {
    let mut apu = Apu::new();
    apu.set_sample_rate(SAMPLE_RATE);
    // 131072 / (2048 - 1750) = 439.8 Hz, within a cent of A440.
    tone_on_ch1(&mut apu, 1750);

    // Run a second of audio in machine-step-sized chunks.
    let mut remaining = CPU_HZ;
    while remaining > 0 {
        let chunk = remaining.min(64) as u16;
        apu.step(chunk);
        remaining -= chunk as u32;
    }

    let samples = drain_left_samples(&apu, SAMPLE_RATE as usize);
    assert!(samples.len() > SAMPLE_RATE as usize / 2, "ring under-filled");

    // Measure the fundamental from rising zero crossings.
    let mut first = None;
    let mut last = 0usize;
    let mut crossings = 0u32;
    for i in 1..samples.len() {
        if samples[i - 1] < 0.0 && samples[i] >= 0.0 {
            if first.is_none() {
                first = Some(i);
            }
            last = i;
            crossings += 1;
        }
    }
    assert!(crossings > 2, "no oscillation on channel 1");
    let span_seconds = (last - first.unwrap()) as f32 / SAMPLE_RATE as f32;
    let freq = (crossings - 1) as f32 / span_seconds;
    let expected = 131072.0 / (2048.0 - 1750.0);
    assert!(
        (freq - expected).abs() / expected < 0.01,
        "measured {freq} Hz, expected {expected} Hz"
    );
}

#[test]
fn ring_never_exceeds_capacity() {
    let mut apu = Apu::new();
    apu.set_sample_rate(SAMPLE_RATE);
    tone_on_ch1(&mut apu, 1750);

    let ring = apu.ring();
    let capacity = ring.capacity();
    // Step far more audio than the ring can hold without draining.
    for _ in 0..(CPU_HZ / 32) {
        apu.step(32);
        assert!(ring.len() <= capacity);
    }
    assert_eq!(ring.len(), capacity);
}

#[test]
fn length_counter_silences_channel() {
    let mut apu = Apu::new();
    apu.write_reg(0xFF26, 0x80);
    apu.write_reg(0xFF25, 0x22);
    apu.write_reg(0xFF17, 0xF0);
    apu.write_reg(0xFF18, 0x00);
    apu.write_reg(0xFF19, 0xC0); // trigger with length enable
    assert_eq!(apu.read_reg(0xFF26) & 0x02, 0x02);

    // The trigger restarts the counter at 0; it expires after 64 clocks of
    // the 256 Hz length timer.
    apu.step(16384);
    assert_eq!(apu.read_reg(0xFF26) & 0x02, 0x02);
    for _ in 0..64 {
        apu.step(16384);
    }
    assert_eq!(apu.read_reg(0xFF26) & 0x02, 0x00);
}

#[test]
fn length_disabled_channel_keeps_playing() {
    let mut apu = Apu::new();
    apu.write_reg(0xFF26, 0x80);
    apu.write_reg(0xFF17, 0xF0);
    apu.write_reg(0xFF19, 0x80); // trigger, length disabled
    for _ in 0..100 {
        apu.step(16384);
    }
    assert_eq!(apu.read_reg(0xFF26) & 0x02, 0x02);
}

#[test]
fn envelope_decays_to_zero() {
    let mut apu = Apu::new();
    apu.write_reg(0xFF26, 0x80);
    apu.write_reg(0xFF25, 0x22);
    apu.write_reg(0xFF17, 0xF1); // start at 15, decrease every envelope tick
    apu.write_reg(0xFF19, 0x80);
    assert_eq!(apu.ch2_volume(), 15);

    // Envelope ticks at 64 Hz (every 65536 cycles): 15 ticks to silence.
    for _ in 0..32 {
        apu.step(32768);
    }
    assert_eq!(apu.ch2_volume(), 0);
    // Saturates at the bound instead of wrapping.
    apu.step(32768);
    apu.step(32768);
    assert_eq!(apu.ch2_volume(), 0);
}

#[test]
fn sweep_shifts_period_up() {
    let mut apu = Apu::new();
    apu.write_reg(0xFF26, 0x80);
    apu.write_reg(0xFF10, 0x11); // pace 1, add, shift 1
    apu.write_reg(0xFF12, 0xF0);
    apu.write_reg(0xFF13, 0x00);
    apu.write_reg(0xFF14, 0x84); // period 0x400, trigger
    assert_eq!(apu.ch1_period(), 0x400);

    // Sweep clocks at 128 Hz (sequencer steps 2 and 6).
    apu.step(8192); // step 0: lengths only
    apu.step(8192); // step 1
    apu.step(8192); // step 2: sweep fires
    assert_eq!(apu.ch1_period(), 0x600);
}

#[test]
fn sweep_overflow_silences_channel() {
    let mut apu = Apu::new();
    apu.write_reg(0xFF26, 0x80);
    apu.write_reg(0xFF10, 0x11);
    apu.write_reg(0xFF12, 0xF0);
    apu.write_reg(0xFF13, 0xFF);
    apu.write_reg(0xFF14, 0x87); // period 0x7FF, trigger
    assert_eq!(apu.read_reg(0xFF26) & 0x01, 0x01);

    for _ in 0..8 {
        apu.step(8192);
    }
    assert_eq!(apu.read_reg(0xFF26) & 0x01, 0x00);
}

#[test]
fn frame_sequencer_runs_at_512_hz() {
    let mut apu = Apu::new();
    apu.write_reg(0xFF26, 0x80);
    let start = apu.sequencer_step();
    apu.step(8192);
    assert_eq!(apu.sequencer_step(), (start + 1) & 7);
    for _ in 0..8 {
        apu.step(8192);
    }
    assert_eq!(apu.sequencer_step(), (start + 1) & 7);
}

#[test]
fn wave_channel_plays_pattern() {
    let mut apu = Apu::new();
    apu.write_reg(0xFF26, 0x80);
    apu.write_reg(0xFF25, 0x44);
    // Wave RAM must be written before the channel starts.
    for i in 0..16u16 {
        apu.write_reg(0xFF30 + i, 0xF0);
    }
    apu.write_reg(0xFF1A, 0x80); // DAC on
    apu.write_reg(0xFF1C, 0x20); // full volume
    apu.write_reg(0xFF1D, 0x00);
    apu.write_reg(0xFF1E, 0x80); // trigger
    assert_eq!(apu.read_reg(0xFF26) & 0x04, 0x04);
    assert_eq!(apu.ch3_position(), 0);

    // One full 32-step sweep of the table takes (2048-0)*2*32 cycles.
    apu.step(4096);
    assert_eq!(apu.ch3_position(), 1);

    // Reads are blocked while playing, restored when the DAC goes off.
    assert_eq!(apu.read_reg(0xFF30), 0xFF);
    apu.write_reg(0xFF1A, 0x00);
    assert_eq!(apu.read_reg(0xFF30), 0xF0);
}

#[test]
fn noise_lfsr_advances_and_resets_on_trigger() {
    let mut apu = Apu::new();
    apu.write_reg(0xFF26, 0x80);
    apu.write_reg(0xFF25, 0x88);
    apu.write_reg(0xFF21, 0xF0);
    apu.write_reg(0xFF22, 0x00); // divisor 0 (x0.5), shift 0: fastest clock
    apu.write_reg(0xFF23, 0x80);
    assert_eq!(apu.ch4_lfsr(), 0x7FFF);

    apu.step(1024);
    assert_ne!(apu.ch4_lfsr(), 0x7FFF);

    apu.write_reg(0xFF23, 0x80);
    assert_eq!(apu.ch4_lfsr(), 0x7FFF);
}

#[test]
fn master_disable_gates_register_writes() {
    let mut apu = Apu::new();
    apu.write_reg(0xFF26, 0x80);
    apu.write_reg(0xFF12, 0xF0);
    apu.write_reg(0xFF14, 0x80);
    assert_eq!(apu.read_reg(0xFF26) & 0x01, 0x01);

    apu.write_reg(0xFF26, 0x00);
    assert_eq!(apu.read_reg(0xFF26) & 0x0F, 0x00);
    apu.write_reg(0xFF12, 0xF0);
    assert_eq!(apu.read_reg(0xFF12), 0x00);
}

#[test]
fn silence_keeps_sample_cadence() {
    // With the APU off the host stream still advances at the sample rate.
    let mut apu = Apu::new();
    apu.set_sample_rate(SAMPLE_RATE);
    apu.write_reg(0xFF26, 0x00);

    apu.step((CPU_HZ / SAMPLE_RATE * 10) as u16);
    let ring = apu.ring();
    let mut out = [0.0f32; 64];
    let got = ring.read(&mut out);
    assert!(got >= 18, "expected ~20 samples, got {got}");
    assert!(out[..got].iter().all(|&s| s == 0.0));
}
