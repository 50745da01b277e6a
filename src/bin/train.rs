use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use dustbot::{
    BotKind, DqnAgent, DqnConfig, Environment, EpisodeStats, PpoAgent, PpoConfig, RandomWalkBot,
    StepOutcome, run_bot_episode, run_dqn_episode, run_ppo_episode,
};

type TrainBackend = Autodiff<NdArray<f32>>;

const ACTION_NAMES: [&str; 3] = ["forward", "backward", "idle"];

#[derive(Parser, Debug)]
#[command(
    about = "Train a dirt-cleaning bot with DQN or PPO on a demo strip environment",
    version,
    author
)]
struct TrainArgs {
    /// Learner to train: dqn, ppo or random (baseline, no learning).
    #[arg(long, default_value = "dqn")]
    algorithm: BotKind,
    /// Number of training episodes.
    #[arg(long, default_value_t = 250)]
    episodes: usize,
    /// Replay minibatch size (DQN) or update minibatch size (PPO).
    #[arg(long, default_value_t = 32)]
    batch_size: usize,
    /// Step limit per episode.
    #[arg(long, default_value_t = 500)]
    max_steps: usize,
    /// Number of cells in the demo strip.
    #[arg(long, default_value_t = 24)]
    cells: usize,
    /// Number of dirty cells at the start of each episode.
    #[arg(long, default_value_t = 6)]
    dirt: usize,
    /// Learning rate passed to the Adam optimizer.
    #[arg(long)]
    learning_rate: Option<f64>,
    /// Master seed controlling reproducibility.
    #[arg(long, default_value_t = 0xC1EA_4B07u64)]
    seed: u64,
    /// Directory where the final checkpoint is written.
    #[arg(long, default_value = "checkpoints")]
    output: PathBuf,
    /// Continue from a checkpoint written by this program.
    #[arg(long)]
    resume: Option<PathBuf>,
}

/// One-dimensional strip of cells. The bot collects dirt by driving over it.
struct DirtStrip {
    cells: usize,
    dirt: usize,
    max_steps: usize,
    position: usize,
    dirty: Vec<bool>,
    steps: usize,
    rng: StdRng,
    actions: [usize; 3],
}

impl DirtStrip {
    fn new(cells: usize, dirt: usize, max_steps: usize, seed: u64) -> Self {
        Self {
            cells,
            dirt: dirt.min(cells.saturating_sub(1)),
            max_steps,
            position: 0,
            dirty: vec![false; cells],
            steps: 0,
            rng: StdRng::seed_from_u64(seed),
            actions: [0, 1, 2],
        }
    }

    fn remaining(&self) -> usize {
        self.dirty.iter().filter(|&&dirty| dirty).count()
    }

    fn nearest(&self, forward: bool) -> f32 {
        let found = if forward {
            (self.position..self.cells).find(|&cell| self.dirty[cell])
        } else {
            (0..=self.position).rev().find(|&cell| self.dirty[cell])
        };
        found
            .map(|cell| cell.abs_diff(self.position) as f32 / self.cells as f32)
            .unwrap_or(1.0)
    }

    fn observe(&self) -> Vec<f32> {
        vec![
            self.position as f32 / (self.cells - 1).max(1) as f32,
            self.remaining() as f32 / self.dirt.max(1) as f32,
            self.nearest(true),
            self.nearest(false),
        ]
    }
}

impl Environment for DirtStrip {
    fn reset(&mut self) -> Vec<f32> {
        self.position = 0;
        self.steps = 0;
        self.dirty = vec![false; self.cells];
        let mut placed = 0;
        while placed < self.dirt {
            let cell = self.rng.gen_range(1..self.cells);
            if !self.dirty[cell] {
                self.dirty[cell] = true;
                placed += 1;
            }
        }
        self.observe()
    }

    fn step(&mut self, action: usize) -> StepOutcome {
        self.steps += 1;
        let mut reward = -0.01;
        let mut bumped = false;
        match action {
            0 if self.position + 1 < self.cells => self.position += 1,
            1 if self.position > 0 => {
                self.position -= 1;
                reward -= 0.1;
            }
            0 | 1 => bumped = true,
            _ => reward -= 0.02,
        }
        if bumped {
            reward -= 0.5;
        }
        if self.dirty[self.position] {
            self.dirty[self.position] = false;
            reward += 1.0;
        }
        let remaining = self.remaining();
        let done = remaining == 0 || self.steps >= self.max_steps;
        StepOutcome::new(self.observe(), reward, done)
            .with_info("dirt_collected", (self.dirt - remaining) as f32)
    }

    fn action_space(&self) -> &[usize] {
        &self.actions
    }

    fn observation_size(&self) -> usize {
        4
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = TrainArgs::parse();
    validate_args(&args)?;
    fs::create_dir_all(&args.output)?;

    let mut env = DirtStrip::new(args.cells, args.dirt, args.max_steps, args.seed);
    let state_size = env.observation_size();
    let action_size = env.action_count();
    let device = Default::default();
    let max_steps = Some(args.max_steps);
    let started = Instant::now();

    println!(
        "Training {} on a {}-cell strip with {} dirt ({} episodes)",
        args.algorithm, args.cells, args.dirt, args.episodes
    );
    match args.algorithm {
        BotKind::Dqn => {
            let mut config = DqnConfig::new(state_size, action_size).with_seed(args.seed);
            if let Some(rate) = args.learning_rate {
                config = config.with_learning_rate(rate);
            }
            let mut agent = DqnAgent::<TrainBackend>::new(config, device)?;
            if let Some(path) = &args.resume {
                agent.load(path)?;
                agent.sync_target();
            }
            for episode in 0..args.episodes {
                let stats = run_dqn_episode(&mut env, &mut agent, args.batch_size, max_steps)?;
                report(episode, args.episodes, &stats, &env, started);
            }
            println!("final epsilon: {:.4}", agent.epsilon());
            let path = args.output.join("dqn_model.bin");
            agent.save(&path)?;
            println!("checkpoint saved -> {}", path.display());
        }
        BotKind::Ppo => {
            let mut config = PpoConfig::new(state_size, action_size)
                .with_seed(args.seed)
                .with_batch_size(args.batch_size);
            if let Some(rate) = args.learning_rate {
                config = config.with_learning_rate(rate);
            }
            let mut agent = PpoAgent::<TrainBackend>::new(config, device)?;
            if let Some(path) = &args.resume {
                agent.load(path)?;
                agent.set_evaluation(false);
            }
            for episode in 0..args.episodes {
                let stats = run_ppo_episode(&mut env, &mut agent, max_steps)?;
                report(episode, args.episodes, &stats, &env, started);
            }
            let path = args.output.join("ppo_model.bin");
            agent.save(&path)?;
            println!("checkpoint saved -> {}", path.display());
        }
        BotKind::RandomWalk => {
            let mut bot = RandomWalkBot::new(action_size, StdRng::seed_from_u64(args.seed))?;
            for episode in 0..args.episodes {
                let stats = run_bot_episode(&mut env, &mut bot, max_steps)?;
                report(episode, args.episodes, &stats, &env, started);
            }
        }
    }
    info!("training finished in {:.1}s", started.elapsed().as_secs_f32());
    Ok(())
}

fn validate_args(args: &TrainArgs) -> Result<(), Box<dyn Error>> {
    if args.cells < 2 {
        return Err("the strip needs at least two cells".into());
    }
    if args.dirt == 0 || args.dirt >= args.cells {
        return Err("dirt must be between 1 and cells - 1".into());
    }
    if args.episodes == 0 {
        return Err("episodes must be positive".into());
    }
    if args.batch_size == 0 {
        return Err("batch size must be positive".into());
    }
    if args.max_steps == 0 {
        return Err("max steps must be positive".into());
    }
    Ok(())
}

fn report(episode: usize, total: usize, stats: &EpisodeStats, env: &DirtStrip, started: Instant) {
    let elapsed = started.elapsed().as_secs();
    let counts: Vec<String> = ACTION_NAMES
        .iter()
        .zip(&stats.action_counts)
        .map(|(name, count)| format!("{name}={count}"))
        .collect();
    println!(
        "Episode {}/{}, reward {:.2}, dirt {}/{}, steps {}, updates {}, total time {}:{:02} [{}]",
        episode + 1,
        total,
        stats.total_reward,
        env.dirt - env.remaining(),
        env.dirt,
        stats.steps,
        stats.updates,
        elapsed / 60,
        elapsed % 60,
        counts.join(", ")
    );
}
