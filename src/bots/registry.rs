use std::fmt;
use std::str::FromStr;

use burn::tensor::backend::AutodiffBackend;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::bot::Bot;
use crate::bots::RandomWalkBot;
use crate::error::AgentError;
use crate::ml::{DqnAgent, DqnConfig, PpoAgent, PpoConfig};

/// The finite set of bot behaviours, resolved once when a bot is built.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BotKind {
    Dqn,
    Ppo,
    RandomWalk,
}

impl BotKind {
    pub const ALL: [BotKind; 3] = [BotKind::Dqn, BotKind::Ppo, BotKind::RandomWalk];

    pub fn label(self) -> &'static str {
        match self {
            BotKind::Dqn => "dqn",
            BotKind::Ppo => "ppo",
            BotKind::RandomWalk => "random",
        }
    }
}

impl fmt::Display for BotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BotKind {
    type Err = String;

    /// Accepts the label, optionally followed by `:<suffix>`, case-insensitively.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let head = spec
            .split(':')
            .next()
            .unwrap_or(spec)
            .trim()
            .to_ascii_lowercase();
        match head.as_str() {
            "dqn" => Ok(BotKind::Dqn),
            "ppo" => Ok(BotKind::Ppo),
            "random" | "random-walk" => Ok(BotKind::RandomWalk),
            _ => Err(format!("unrecognized bot spec: {spec}")),
        }
    }
}

/// Builds a fresh, untrained bot of the requested kind.
pub fn create_bot<B>(
    kind: BotKind,
    state_size: usize,
    action_size: usize,
    seed: u64,
    device: B::Device,
) -> Result<Box<dyn Bot>, AgentError>
where
    B: AutodiffBackend + 'static,
{
    let bot: Box<dyn Bot> = match kind {
        BotKind::Dqn => Box::new(DqnAgent::<B>::new(
            DqnConfig::new(state_size, action_size).with_seed(seed),
            device,
        )?),
        BotKind::Ppo => Box::new(PpoAgent::<B>::new(
            PpoConfig::new(state_size, action_size).with_seed(seed),
            device,
        )?),
        BotKind::RandomWalk => Box::new(RandomWalkBot::new(
            action_size,
            StdRng::seed_from_u64(seed),
        )?),
    };
    Ok(bot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;

    #[test]
    fn specs_parse_case_insensitively() {
        assert_eq!("DQN".parse::<BotKind>(), Ok(BotKind::Dqn));
        assert_eq!("ppo:best".parse::<BotKind>(), Ok(BotKind::Ppo));
        assert_eq!("random".parse::<BotKind>(), Ok(BotKind::RandomWalk));
        assert!("spiral".parse::<BotKind>().is_err());
        for kind in BotKind::ALL {
            assert_eq!(kind.label().parse::<BotKind>(), Ok(kind));
        }
    }

    #[test]
    fn every_kind_builds_a_working_bot() {
        for kind in BotKind::ALL {
            let mut bot =
                create_bot::<Autodiff<NdArray<f32>>>(kind, 3, 4, 5, Default::default())
                    .expect("bot");
            let action = bot.select_action(&[0.1, 0.2, 0.3]).expect("action");
            assert!(action < 4, "{kind} picked {action}");
        }
    }
}
