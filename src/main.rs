use std::{path::PathBuf, sync::mpsc, thread, time::Duration};

use clap::Parser;
use log::info;

use n64_link::{ButtonEvent, ButtonEventKind, ConfigError, ControllerLink, LinkConfig, N64State};

/// Poll a simulated N64 controller and print what the link decodes.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// YAML file with timing and the simulated controller's replies.
    #[arg(short, long, default_value = "link.yml")]
    config: PathBuf,

    /// Number of polls to run. Defaults to one per scripted reply.
    #[arg(short, long)]
    polls: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
enum ControlMessage {
    Button { event: ButtonEvent },
}

fn main() -> Result<(), ConfigError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = LinkConfig::load(&args.config)?;
    info!("loaded {}", args.config.display());

    let replies = config.simulation.replies.clone();
    let polls = args.polls.unwrap_or(replies.len());
    let line = config.simulation.line(config.timing);
    let mut link = ControllerLink::with_timing(line, config.timing);

    let (tx, rx) = mpsc::channel::<ControlMessage>();
    link.set_button_callback(move |_, event| {
        let _ = tx.send(ControlMessage::Button { event });
    });

    let interval = Duration::from_millis(config.poll_interval_ms);
    let mut script = replies.iter().cycle();

    for poll in 0..polls {
        if let Some(reply) = script.next() {
            link.line_mut().push_reply(reply.clone());
        }

        match link.poll() {
            Ok(state) => println!("poll {poll}: {}", describe(&state)),
            Err(err) => println!("poll {poll}: {err}, keeping {}", describe(link.state())),
        }

        while let Ok(message) = rx.try_recv() {
            match message {
                ControlMessage::Button { event } => {
                    let verb = match event.kind {
                        ButtonEventKind::Pressed => "pressed",
                        ButtonEventKind::Released => "released",
                    };
                    println!("  {:?} {verb}", event.id);
                }
            }
        }

        thread::sleep(interval);
    }

    Ok(())
}

fn describe(state: &N64State) -> String {
    let held: Vec<&str> = [
        (state.a_down(), "A"),
        (state.b_down(), "B"),
        (state.z_down(), "Z"),
        (state.start_down(), "Start"),
        (state.l_bumper_down(), "L"),
        (state.r_bumper_down(), "R"),
        (state.d_up_down(), "D-Up"),
        (state.d_down_down(), "D-Down"),
        (state.d_left_down(), "D-Left"),
        (state.d_right_down(), "D-Right"),
        (state.c_up_down(), "C-Up"),
        (state.c_down_down(), "C-Down"),
        (state.c_left_down(), "C-Left"),
        (state.c_right_down(), "C-Right"),
    ]
    .into_iter()
    .filter_map(|(down, name)| down.then_some(name))
    .collect();

    format!(
        "buttons [{}] stick ({}, {})",
        held.join(" "),
        state.stick_x(),
        state.stick_y()
    )
}
