use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use stock::assembler::PipettingStrategy;
use transfer::sector::TranslationBehaviour;

#[derive(Parser, Debug)]
#[command(name = "screenprep", version, about = "ISO processing for liquid-handling workflows")]
pub struct Opts {
    #[command(flatten)]
    pub verbosity: clap_verbosity_flag::Verbosity,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pick stock tubes for an ISO and emit the XL20 worklist bundle.
    PickTubes {
        /// Stock inventory file (JSON).
        #[arg(long)]
        inventory: PathBuf,

        /// Assembly request file (JSON): layout, pools, destination racks.
        #[arg(long)]
        request: PathBuf,

        /// Directory the worklist bundle is written to.
        #[arg(long, default_value = ".")]
        output: PathBuf,
    },
    /// Translate a rack position between sector-composed racks.
    Translate {
        #[arg(long, default_value_t = 4)]
        sectors: usize,

        #[arg(long, default_value_t = 0)]
        source_sector: usize,

        #[arg(long, default_value_t = 0)]
        target_sector: usize,

        #[arg(long, value_enum)]
        behaviour: BehaviourArg,

        /// Position label, e.g. 'C3'.
        position: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BehaviourArg {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl BehaviourArg {
    pub fn to_behaviour(self) -> TranslationBehaviour {
        match self {
            BehaviourArg::OneToOne => TranslationBehaviour::OneToOne,
            BehaviourArg::OneToMany => TranslationBehaviour::OneToMany,
            BehaviourArg::ManyToOne => TranslationBehaviour::ManyToOne,
            BehaviourArg::ManyToMany => TranslationBehaviour::ManyToMany,
        }
    }
}

#[derive(serde::Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum StrategyArg {
    Biomek,
    Cybio,
}

impl StrategyArg {
    pub fn to_strategy(self) -> PipettingStrategy {
        match self {
            StrategyArg::Biomek => PipettingStrategy::Biomek,
            StrategyArg::Cybio => PipettingStrategy::CyBio,
        }
    }
}
