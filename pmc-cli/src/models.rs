use std::fmt::Display;

use clap::ValueEnum;
use pmc::{
    generator::{
        program::{Command, Program, RewardStructure},
        variables::VariableInformation,
    },
    linalg::fields::PseudoField,
    models::{EventDistribution, EventVariableInformation, ModelType},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Model {
    /// Knuth and Yao's simulation of a die by coin flips (DTMC).
    Die,
    /// A gambler choosing between bold and timid bets (MDP).
    Gambler,
    /// Two queues in tandem (CTMC).
    Tandem,
    /// Jobs dispatched nondeterministically to two servers (Markov automaton).
    Dispatch,
    /// A component with exponential failures and uniform repairs (GSMP).
    Repair,
}

impl Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Model::Die => write!(f, "die"),
            Model::Gambler => write!(f, "gambler"),
            Model::Tandem => write!(f, "tandem"),
            Model::Dispatch => write!(f, "dispatch"),
            Model::Repair => write!(f, "repair"),
        }
    }
}

/// Instantiates a model; `size` scales models with a parameter.
pub fn choose_model<F: PseudoField + 'static>(model: Model, size: i64) -> Program<F> {
    match model {
        Model::Die => die(),
        Model::Gambler => gambler(size),
        Model::Tandem => tandem(size),
        Model::Dispatch => dispatch(size),
        Model::Repair => repair(),
    }
}

fn value<F: PseudoField>(numerator: &str, denominator: &str) -> F {
    F::from_rational(numerator, denominator)
}

pub fn die<F: PseudoField + 'static>() -> Program<F> {
    let mut variables = VariableInformation::new();
    let s = variables.add_integer("s", 0, 7);
    let d = variables.add_integer("d", 0, 6);
    let mut program = Program::new(ModelType::Dtmc, variables);

    // (state, heads, tails); targets from 7 on stand for the die value `target - 6`.
    let flips: [(i64, i64, i64); 6] = [
        (0, 1, 2),
        (1, 3, 4),
        (2, 5, 6),
        (3, 1, 7),
        (4, 8, 9),
        (5, 10, 11),
    ];
    for (state, heads, tails) in flips {
        let mut command = Command::new(format!("flip_{state}"), move |a| a.get(s) == state);
        for target in [heads, tails] {
            command = command.update(value("1", "2"), move |a| {
                if target < 7 {
                    a.set(s, target);
                } else {
                    a.set(s, 7);
                    a.set(d, target - 6);
                }
            });
        }
        program.add_command(command);
    }
    // Flipping tails in state 6 restarts the procedure at state 2.
    program.add_command(
        Command::new("flip_6", move |a| a.get(s) == 6)
            .update(value("1", "2"), move |a| a.set(s, 2))
            .update(value("1", "2"), move |a| {
                a.set(s, 7);
                a.set(d, 6);
            }),
    );
    program.add_command(Command::new("done", move |a| a.get(s) == 7).update(F::one(), |_| {}));

    for face in 1..=6 {
        program.add_label(format!("face_{face}"), move |a| a.get(s) == 7 && a.get(d) == face);
    }
    program.add_label("done", move |a| a.get(s) == 7);
    program.add_reward_structure(
        RewardStructure::new("coin_flips").state_reward(move |a| a.get(s) < 7, |_| F::one()),
    );
    program
}

pub fn gambler<F: PseudoField + 'static>(goal: i64) -> Program<F> {
    let mut variables = VariableInformation::new();
    let money = variables.add_integer("money", 0, goal);
    let mut program = Program::new(ModelType::Mdp, variables);
    let mut initial = program.variables().lower_bounds();
    initial.set(money, goal / 2);
    program.add_initial_state(initial);

    let bold = program.add_action("bold");
    let timid = program.add_action("timid");
    program.add_command(
        Command::new("bold", move |a| a.get(money) > 0 && a.get(money) < goal)
            .with_action(bold)
            .update(value("2", "5"), move |a| {
                let doubled = (2 * a.get(money)).min(goal);
                a.set(money, doubled)
            })
            .update(value("3", "5"), move |a| a.set(money, 0)),
    );
    program.add_command(
        Command::new("timid", move |a| a.get(money) > 0 && a.get(money) < goal)
            .with_action(timid)
            .update(value("2", "5"), move |a| a.set(money, a.get(money) + 1))
            .update(value("3", "5"), move |a| a.set(money, a.get(money) - 1)),
    );
    program.set_terminal(move |a| a.get(money) == 0 || a.get(money) == goal);

    program.add_label("rich", move |a| a.get(money) == goal);
    program.add_label("broke", move |a| a.get(money) == 0);
    program.add_reward_structure(
        RewardStructure::new("bets")
            .action_reward(Some(bold), |_| true, |_| F::one())
            .action_reward(Some(timid), |_| true, |_| F::one()),
    );
    program
}

pub fn tandem<F: PseudoField + 'static>(capacity: i64) -> Program<F> {
    let mut variables = VariableInformation::new();
    let first = variables.add_integer("first", 0, capacity);
    let second = variables.add_integer("second", 0, capacity);
    let phase = variables.add_integer("phase", 1, 2);
    let mut program = Program::new(ModelType::Ctmc, variables);

    let arrival = value::<F>(&(4 * capacity).to_string(), "1");
    program.add_command(
        Command::new("arrive", move |a| a.get(first) < capacity)
            .update(arrival, move |a| a.set(first, a.get(first) + 1)),
    );
    // The first station serves in two phases.
    program.add_command(
        Command::new("serve_1_phase_1", move |a| a.get(first) > 0 && a.get(phase) == 1)
            .update(value("9", "5"), move |a| a.set(phase, 2))
            .update(value("1", "5"), move |a| {
                a.set(first, a.get(first) - 1);
                a.set(second, (a.get(second) + 1).min(capacity));
            }),
    );
    program.add_command(
        Command::new("serve_1_phase_2", move |a| a.get(first) > 0 && a.get(phase) == 2).update(
            value("2", "1"),
            move |a| {
                a.set(phase, 1);
                a.set(first, a.get(first) - 1);
                a.set(second, (a.get(second) + 1).min(capacity));
            },
        ),
    );
    program.add_command(
        Command::new("serve_2", move |a| a.get(second) > 0)
            .update(value("2", "1"), move |a| a.set(second, a.get(second) - 1)),
    );

    program.add_label("full", move |a| a.get(first) == capacity && a.get(second) == capacity);
    program.add_label("first_full", move |a| a.get(first) == capacity);
    program.add_reward_structure(RewardStructure::new("customers").state_reward(
        |_| true,
        move |a| value(&(a.get(first) + a.get(second)).to_string(), "1"),
    ));
    program
}

pub fn dispatch<F: PseudoField + 'static>(capacity: i64) -> Program<F> {
    let mut variables = VariableInformation::new();
    let waiting = variables.add_boolean("waiting");
    let left = variables.add_integer("left", 0, capacity);
    let right = variables.add_integer("right", 0, capacity);
    let mut program = Program::new(ModelType::MarkovAutomaton, variables);

    let to_left = program.add_action("to_left");
    let to_right = program.add_action("to_right");
    program.add_command(
        Command::new("arrive", move |a| !a.is(waiting))
            .markovian()
            .update(value("3", "1"), move |a| a.set_bool(waiting, true)),
    );
    program.add_command(
        Command::new("to_left", move |a| a.is(waiting) && a.get(left) < capacity)
            .with_action(to_left)
            .update(F::one(), move |a| {
                a.set_bool(waiting, false);
                a.set(left, a.get(left) + 1)
            }),
    );
    program.add_command(
        Command::new("to_right", move |a| a.is(waiting) && a.get(right) < capacity)
            .with_action(to_right)
            .update(F::one(), move |a| {
                a.set_bool(waiting, false);
                a.set(right, a.get(right) + 1)
            }),
    );
    program.add_command(
        Command::new("serve_left", move |a| !a.is(waiting) && a.get(left) > 0)
            .markovian()
            .update(value("2", "1"), move |a| a.set(left, a.get(left) - 1)),
    );
    program.add_command(
        Command::new("serve_right", move |a| !a.is(waiting) && a.get(right) > 0)
            .markovian()
            .update(value("1", "1"), move |a| a.set(right, a.get(right) - 1)),
    );
    // A waiting job that fits nowhere is lost.
    program.add_command(
        Command::new("drop", move |a| {
            a.is(waiting) && a.get(left) == capacity && a.get(right) == capacity
        })
        .markovian()
        .update(F::one(), move |a| a.set_bool(waiting, false)),
    );

    program.add_label("busy", move |a| a.get(left) == capacity && a.get(right) == capacity);
    program.add_reward_structure(
        RewardStructure::new("dispatches")
            .action_reward(Some(to_left), |_| true, |_| F::one())
            .action_reward(Some(to_right), |_| true, |_| F::one()),
    );
    program
}

pub fn repair<F: PseudoField + 'static>() -> Program<F> {
    let mut variables = VariableInformation::new();
    let broken = variables.add_boolean("broken");
    let failures = variables.add_integer("failures", 0, 3);
    let mut program = Program::new(ModelType::Gsmp, variables);

    program.add_event("fail", EventVariableInformation::exponential(value("1", "10")));
    program.add_event(
        "repair",
        EventVariableInformation::with_two_args(
            EventDistribution::Uniform,
            value("1", "1"),
            value("3", "1"),
        ),
    );
    program.add_command(
        Command::new("fail", move |a| !a.is(broken) && a.get(failures) < 3)
            .with_event("fail")
            .update(F::one(), move |a| {
                a.set_bool(broken, true);
                a.set(failures, a.get(failures) + 1)
            }),
    );
    program.add_command(
        Command::new("repair", move |a| a.is(broken))
            .with_event("repair")
            .update(F::one(), move |a| a.set_bool(broken, false)),
    );

    program.set_terminal(move |a| !a.is(broken) && a.get(failures) == 3);

    program.add_label("broken", move |a| a.is(broken));
    program.add_label("worn_out", move |a| a.get(failures) == 3);
    program
}
