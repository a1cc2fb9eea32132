use std::fmt;

use learn_core::model::{
    Choice, ChoiceId, ModuleId, Question, QuestionId, QuestionSet, SectionName, TopicKey,
};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    module_id: ModuleId,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidModule { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidModule { raw } => write!(f, "invalid --module value: {raw:?}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("LEARN_DB_URL").unwrap_or_else(|_| "sqlite://dev.sqlite3?mode=rwc".into());
        let mut module_raw =
            std::env::var("LEARN_MODULE").unwrap_or_else(|_| "cell-biology".into());

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--module" => {
                    module_raw = require_value(&mut args, "--module")?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let module_id = ModuleId::new(module_raw.clone())
            .map_err(|_| ArgsError::InvalidModule { raw: module_raw })?;

        Ok(Self { db_url, module_id })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://dev.sqlite3?mode=rwc)");
    eprintln!("  --module <id>             Module to load sample sections into (default: cell-biology)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  LEARN_DB_URL, LEARN_MODULE");
}

/// (prompt, choices, correct index, explanation)
type Sample = (&'static str, [&'static str; 4], usize, &'static str);

const STRUCTURE: [Sample; 5] = [
    (
        "Which organelle produces most of the cell's ATP?",
        ["Mitochondrion", "Golgi apparatus", "Lysosome", "Ribosome"],
        0,
        "Oxidative phosphorylation in the mitochondrion yields most ATP.",
    ),
    (
        "Where are ribosomal subunits assembled?",
        ["Cytosol", "Nucleolus", "Smooth ER", "Vacuole"],
        1,
        "rRNA is transcribed and packaged with proteins in the nucleolus.",
    ),
    (
        "Which structure modifies and sorts proteins for secretion?",
        ["Peroxisome", "Centriole", "Golgi apparatus", "Nucleus"],
        2,
        "The Golgi tags proteins and ships them in vesicles.",
    ),
    (
        "What does the cell membrane's phospholipid bilayer mainly control?",
        ["DNA replication", "Protein folding", "ATP synthesis", "What enters and leaves the cell"],
        3,
        "The bilayer is selectively permeable.",
    ),
    (
        "Which organelle contains digestive enzymes?",
        ["Lysosome", "Chloroplast", "Nucleolus", "Rough ER"],
        0,
        "Lysosomes hold acid hydrolases that break down macromolecules.",
    ),
];

const DIVISION: [Sample; 5] = [
    (
        "During which phase do sister chromatids separate?",
        ["Prophase", "Metaphase", "Anaphase", "Telophase"],
        2,
        "Cohesin is cleaved at anaphase and chromatids move to opposite poles.",
    ),
    (
        "In which phase is DNA replicated?",
        ["G1", "S", "G2", "M"],
        1,
        "Synthesis (S) phase is when the genome is copied.",
    ),
    (
        "How many daughter cells does meiosis produce?",
        ["One", "Two", "Three", "Four"],
        3,
        "Two rounds of division yield four haploid cells.",
    ),
    (
        "Where do chromosomes line up during metaphase?",
        ["Cell plate", "Metaphase plate", "Nuclear envelope", "Centrosome"],
        1,
        "Spindle tension aligns chromosomes on the metaphase plate.",
    ),
    (
        "What divides the cytoplasm after mitosis?",
        ["Cytokinesis", "Interphase", "Crossing over", "Apoptosis"],
        0,
        "Cytokinesis splits the cytoplasm between the two daughter cells.",
    ),
];

const CHOICE_IDS: [&str; 4] = ["a", "b", "c", "d"];

fn build_section(
    module_id: &ModuleId,
    section: &str,
    samples: &[Sample],
) -> Result<QuestionSet, learn_core::Error> {
    let topic = TopicKey::new(module_id.clone(), SectionName::new(section)?);
    let mut questions = Vec::with_capacity(samples.len());
    for (i, (prompt, options, correct, explanation)) in samples.iter().enumerate() {
        let choices = CHOICE_IDS
            .iter()
            .zip(options.iter())
            .map(|(id, text)| Choice::new(*id, *text))
            .collect();
        let question = Question::new(
            QuestionId::new(format!("{section}-{}", i + 1)),
            *prompt,
            choices,
            ChoiceId::new(CHOICE_IDS[*correct]),
            *explanation,
        )?;
        questions.push(question);
    }
    Ok(QuestionSet::new(topic, questions)?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;

    let sections = [
        build_section(&args.module_id, "Cell structure", &STRUCTURE)?,
        build_section(&args.module_id, "Cell division", &DIVISION)?,
    ];
    for section in &sections {
        storage.questions.put_section(section).await?;
    }

    println!(
        "Seeded {} sections of {} questions into module {} at {}",
        sections.len(),
        STRUCTURE.len(),
        args.module_id,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
