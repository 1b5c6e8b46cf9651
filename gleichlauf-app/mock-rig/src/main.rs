mod plant;

use std::io::BufRead;

use clap::Parser;
use embassy_executor::{Executor, Spawner};
use embassy_time::{Duration, Instant, Ticker};
use gleichlauf_core::mk_static;
use gleichlauf_core::utils::session::{Motor, RunStatus, SESSION_CHANNEL, SessionCommand, SyncSession};
use gleichlauf_core::utils::PositionController;
use plant::SimRig;
use rust_decimal::Decimal;
use static_cell::StaticCell;
use tracing::{error, info, warn};

#[derive(Parser)]
#[clap(version = "1.0", about = "Simulated two-motor Gleichlauf rig")]
struct Opts
{
    /// Encoder pulses per revolution
    #[clap(long, default_value_t = 360)]
    resolution: i32,
    /// Proportional gain
    #[clap(long, default_value = "0")]
    gain: Decimal,
    /// Initial setpoint of motor A (rev/s)
    #[clap(long, default_value = "1")]
    setpoint_a: Decimal,
    /// Initial setpoint of motor B (rev/s)
    #[clap(long, default_value = "1")]
    setpoint_b: Decimal,
    /// Apply the correction to motor A
    #[clap(long)]
    control_a: bool,
    /// Apply the correction to motor B
    #[clap(long)]
    control_b: bool,
    /// Mirror setpoint changes onto the other motor
    #[clap(long)]
    simultaneous: bool,
    /// Start with the control loop switched off
    #[clap(long)]
    no_control: bool,
    /// Control cycle period in milliseconds
    #[clap(long, default_value_t = 100)]
    cycle_ms: u64,
    /// End the session after this many cycles
    #[clap(long)]
    cycles: Option<u64>,
    /// Relative gear excess of motor B (0.02 = 2 % faster)
    #[clap(long, default_value = "0.02")]
    mismatch: Decimal,
    /// Wait for a `start` command instead of starting immediately
    #[clap(long)]
    manual: bool,
    /// Print cycle reports as JSON lines on stdout
    #[clap(long)]
    json: bool,
}

/// Read JSON commands from stdin and queue them for the control task.
fn operator_thread() {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("stdin closed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match SessionCommand::parse(&line) {
            Ok(cmd) => {
                if SESSION_CHANNEL.try_send(cmd).is_err() {
                    warn!("command queue full, dropping {:?}", cmd);
                }
            }
            Err(e) => error!(%e, "rejected operator input"),
        }
    }
}

#[embassy_executor::task]
async fn control_task(
    mut session: SyncSession<'static>,
    mut rig: SimRig,
    period: Duration,
    cycles: Option<u64>,
    json: bool,
) {
    let mut ticker = Ticker::every(period);
    let mut last = Instant::now();
    loop {
        while let Ok(cmd) = SESSION_CHANNEL.try_receive() {
            if let Err(e) = session.execute(cmd, &mut rig) {
                warn!(%e, "command rejected");
            }
        }
        if session.status() == RunStatus::End {
            info!(counter = session.counter(), "session ended");
            std::process::exit(0);
        }

        let now = Instant::now();
        rig.advance(now.saturating_duration_since(last));
        last = now;

        if let Some(report) = session.run_cycle(now, &mut rig) {
            if json {
                match serde_json::to_string(&report) {
                    Ok(line) => println!("{}", line),
                    Err(e) => error!(%e, "failed to encode report"),
                }
            } else {
                info!("{}", report);
            }
            if cycles.is_some_and(|limit| report.counter >= limit) {
                if let Err(e) = session.execute(SessionCommand::End, &mut rig) {
                    warn!(%e, "failed to end session");
                }
            }
        }

        ticker.next().await;
    }
}

#[embassy_executor::task]
async fn main_task(
    spawner: Spawner,
    opts: Opts,
) {
    let ctrl: &'static PositionController =
        mk_static!(PositionController, PositionController::new(opts.resolution));
    ctrl.update(|cfg| {
        cfg.gain = opts.gain;
        cfg.motor_a_enabled = opts.control_a;
        cfg.motor_b_enabled = opts.control_b;
    });
    info!(?ctrl, "controller configured");

    let mut session = SyncSession::new(ctrl);
    session.set_control_enabled(!opts.no_control);
    session.set_setpoint(Motor::A, opts.setpoint_a);
    session.set_setpoint(Motor::B, opts.setpoint_b);
    session.set_simultaneous(opts.simultaneous);

    let rig = SimRig::new(ctrl.encoder_resolution().get(), opts.mismatch);

    if !opts.manual {
        SESSION_CHANNEL.send(SessionCommand::Start).await;
    }

    std::thread::spawn(operator_thread);

    let period = Duration::from_millis(opts.cycle_ms.max(1));
    spawner
        .spawn(control_task(session, rig, period, opts.cycles, opts.json))
        .unwrap();
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let opts = Opts::parse();
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task(spawner, opts)).unwrap();
    });
}
