use pmc::{
    BuildError, BuilderOptions, ExplicitModelBuilder, ModelType, SparseModel,
    formats::{ExportError, lab, rew, tra},
    generator::{
        explicit::ExplicitGenerator,
        program::{Command, Program, ProgramGenerator},
        variables::VariableInformation,
    },
    linalg::fields::{FromRational, float64::Float64, rational::Rational},
};
use test_log::test;

const DTMC: &str = "MODEL dtmc
STATES 3
INITIALS 1
TRANSITIONS 4
1
1 2 1/2
1 3 1/2
2 3 1
3 3 1
";

const LABELS: &str = "#DECLARATION
goal init
#END
1 init
3 goal
";

fn build(model: pmc::generator::explicit::ExplicitModel<Rational>) -> SparseModel<Rational> {
    let generator = ExplicitGenerator::new(model).unwrap();
    ExplicitModelBuilder::new(generator, BuilderOptions::default())
        .build()
        .unwrap()
}

fn to_string(write: impl FnOnce(&mut Vec<u8>) -> Result<(), ExportError>) -> String {
    let mut out = Vec::new();
    write(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_files_round_trip() {
    let mut explicit = tra::parse::<Rational>(DTMC).unwrap();
    explicit.labels = lab::parse(LABELS, explicit.state_count()).unwrap();
    explicit
        .state_rewards
        .insert("steps".to_owned(), rew::parse("1 1\n2 1\n", 3).unwrap());
    let model = build(explicit);
    assert_eq!(model.number_of_states(), 3);
    let goal: Vec<usize> = model.labeling().items("goal").unwrap().iter_ones().collect();
    assert_eq!(goal, vec![2]);

    let transitions = to_string(|out| tra::write(&model, out));
    assert_eq!(transitions, DTMC);
    let labels = to_string(|out| lab::write(model.labeling(), out));
    assert_eq!(labels, "#DECLARATION\ndeadlock goal init\n#END\n1 init\n3 goal\n");
    let rewards = to_string(|out| rew::write(model.reward_model("steps").unwrap(), out));
    assert_eq!(rewards, "1 1\n2 1\n");

    let mut reparsed = tra::parse::<Rational>(&transitions).unwrap();
    reparsed.labels = lab::parse(&labels, 3).unwrap();
    let rebuilt = build(reparsed);
    assert_eq!(rebuilt.transition_matrix(), model.transition_matrix());
    assert_eq!(rebuilt.labeling(), model.labeling());
}

#[test]
fn test_mdp_export() {
    let mut variables = VariableInformation::new();
    let x = variables.add_integer("x", 0, 1);
    let mut program = Program::<Float64>::new(ModelType::Mdp, variables);
    program.add_command(Command::new("stay", |_| true).update(Float64::from(1.0), |_| {}));
    program.add_command(
        Command::new("toggle", |_| true)
            .update(Float64::from(0.5), move |s| s.set(x, 1 - s.get(x)))
            .update(Float64::from(0.5), |_| {}),
    );
    let generator = ProgramGenerator::new(program).unwrap();
    let model = ExplicitModelBuilder::new(generator, BuilderOptions::default())
        .build()
        .unwrap();

    let transitions = to_string(|out| tra::write(&model, out));
    assert!(transitions.starts_with("MODEL mdp\nSTATES 2\nINITIALS 1\nTRANSITIONS 6\n1\n"));
    assert!(transitions.contains("\n1 2 2 0.5\n"));

    let explicit = tra::parse::<Float64>(&transitions).unwrap();
    assert_eq!(explicit.choices[1].len(), 2);
    assert_eq!(
        explicit.choices[1][1].transitions,
        vec![(0, Float64::from_rational("1", "2")), (1, Float64::from(0.5))]
    );
}

#[test]
fn test_markov_automata_are_not_exported() {
    let mut variables = VariableInformation::new();
    variables.add_boolean("b");
    let mut program = Program::<Rational>::new(ModelType::MarkovAutomaton, variables);
    program.add_command(
        Command::new("wait", |_| true)
            .markovian()
            .update(Rational::from_rational("2", "1"), |_| {}),
    );
    let generator = ProgramGenerator::new(program).unwrap();
    let model = ExplicitModelBuilder::new(generator, BuilderOptions::default())
        .build()
        .unwrap();
    let result = tra::write(&model, &mut Vec::new());
    assert!(matches!(
        result,
        Err(ExportError::UnsupportedModelType(ModelType::MarkovAutomaton))
    ));
}

#[test]
fn test_negative_rates_are_rejected() {
    let explicit =
        tra::parse::<Float64>("STATES 2\nINITIALS 1\nTRANSITIONS 2\n1\n1 2 -3\n2 1 1").unwrap();
    let generator = ExplicitGenerator::new(explicit).unwrap();
    let result = ExplicitModelBuilder::new(generator, BuilderOptions::default()).build();
    assert!(matches!(result, Err(BuildError::WrongFormat(_))));
}
