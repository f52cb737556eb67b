use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use vaultrisk::artifact::ResultsArtifact;
use vaultrisk::categorize::{label_drift, CategorizationSummary, Categorizer};
use vaultrisk::cli::{
    BaseRatesArgs, CategorizeArgs, Cli, Command, EstimatorArgs, OutputFormat, ProfileArgs,
};
use vaultrisk::config::VaultRiskConfig;
use vaultrisk::csv_output;
use vaultrisk::dataset::{load_csv, LoadReport};
use vaultrisk::estimate::{
    estimate, ranking_report, sensitivity_analysis, BaseRateReport, EstimatorConfig, ProfileSet,
    DEFAULT_UNIVERSE_SIZES,
};
use vaultrisk::json_output::{JsonDataset, JsonOutput};
use vaultrisk::record::{CategorizedExploit, LabelSource};

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Shared state every command starts from
struct Session {
    config: VaultRiskConfig,
    categorizer: Categorizer,
    load: LoadReport,
    source: String,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => VaultRiskConfig::from_toml(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => VaultRiskConfig::default(),
        };

        let categorizer = match &cli.rules {
            Some(path) => Categorizer::from_toml(path)
                .with_context(|| format!("Failed to load keyword rules {}", path.display()))?,
            None => Categorizer::default_rules().context("Built-in keyword rules are invalid")?,
        };

        let load = load_csv(&cli.csv, &config.dataset)
            .with_context(|| format!("Failed to read exploit dataset {}", cli.csv.display()))?;
        report_rejections(&load);
        let load = if cli.strict {
            load.into_strict().context("Malformed row in --strict mode")?
        } else {
            load
        };

        Ok(Self {
            config,
            categorizer,
            load,
            source: cli.csv.display().to_string(),
        })
    }

    /// Categorize every record, or keep stored labels when `trust_labels`
    fn label(&self, trust_labels: bool) -> Vec<CategorizedExploit> {
        let records = self.load.records.iter().cloned();
        if !trust_labels {
            return self.categorizer.categorize_all(records);
        }
        records
            .map(|record| match record.stored_primitive() {
                Some(primitive) => CategorizedExploit::with_label(record, primitive),
                None => self.categorizer.categorize(record),
            })
            .collect()
    }

    fn estimator_config(&self, args: &EstimatorArgs) -> Result<EstimatorConfig> {
        let mut config = self.config.estimator.clone();
        if let Some(vaults) = args.vaults {
            config.vaults = vaults;
        }
        if let Some(years) = args.years {
            config.years = years;
        }
        if let Some(confidence) = args.confidence {
            config.confidence_level = confidence;
        }
        if let Some(method) = args.interval {
            config.interval_method = method;
        }
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid estimator settings: {}", e))?;
        Ok(config)
    }

    fn dataset_summary(&self) -> JsonDataset {
        JsonDataset::from_load_report(self.source.clone(), &self.load)
    }

    fn print_header(&self) {
        println!(
            "Loaded {} exploits from {} ({} rejected, {} below ${} minimum)",
            self.load.records.len(),
            self.source,
            self.load.rejected.len(),
            self.load.below_minimum,
            self.config.dataset.min_amount_usd
        );
        if let Some(span) = self.load.observation_span_years() {
            println!("Observed span of exploit dates: {:.2} years", span);
        }
        println!();
    }
}

fn report_rejections(load: &LoadReport) {
    if load.rejected.is_empty() {
        return;
    }
    eprintln!("warning: {} malformed row(s) rejected:", load.rejected.len());
    for row in &load.rejected {
        eprintln!("  line {}: {}", row.line, row.reason);
    }
}

fn run_base_rates(session: &Session, args: &BaseRatesArgs) -> Result<()> {
    let config = session.estimator_config(&args.estimator)?;
    let exploits = session.label(args.estimator.trust_labels);
    let report = estimate(&exploits, &config).context("Base-rate estimation failed")?;

    if let Some(path) = &args.verify_cache {
        verify_cache(path, &report, &session.load.fingerprint)?;
    }

    let sensitivity = if args.sensitivity {
        Some(sensitivity_analysis(&exploits, &config, &DEFAULT_UNIVERSE_SIZES)?)
    } else {
        None
    };

    match args.format {
        OutputFormat::Text => {
            session.print_header();
            print!("{}", report.to_report_string());
            if let Some(table) = &sensitivity {
                println!();
                print!("{}", table.to_report_string());
            }
        }
        OutputFormat::Json => {
            let mut output = JsonOutput::new(session.dataset_summary(), report.clone());
            if let Some(table) = sensitivity {
                output.set_sensitivity(table);
            }
            println!("{}", output.to_json()?);
        }
        OutputFormat::Csv => {
            if sensitivity.is_some() {
                tracing::warn!("--sensitivity is not included in CSV output");
            }
            print!("{}", csv_output::base_rates_csv(&report));
        }
    }

    if let Some(path) = &args.save {
        ResultsArtifact::from_report(&report, session.source.clone(), &session.load.fingerprint)
            .save(path)
            .with_context(|| format!("Failed to write results artifact {}", path.display()))?;
        eprintln!("Saved results to {}", path.display());
    }

    Ok(())
}

fn verify_cache(path: &Path, report: &BaseRateReport, fingerprint: &str) -> Result<()> {
    let artifact = ResultsArtifact::load(path)
        .with_context(|| format!("Failed to read results artifact {}", path.display()))?;
    artifact
        .verify(report, fingerprint)
        .with_context(|| format!("Cached results in {} are stale", path.display()))?;
    eprintln!("Cached results in {} verified", path.display());
    Ok(())
}

fn run_categorize(session: &Session, args: &CategorizeArgs) -> Result<()> {
    let exploits = session.label(false);

    if args.summary {
        let summary = CategorizationSummary::from_exploits(&exploits);
        session.print_header();
        print!("{}", summary.to_report_string());
    } else {
        for exploit in &exploits {
            let record = exploit.record();
            let matched = match exploit.source() {
                LabelSource::Keyword(keyword) => keyword.as_str(),
                _ => "(fallback)",
            };
            println!(
                "{}  {:<32} {:<12} {:>10.2}M  {}",
                record.date(),
                record.name(),
                exploit.primitive().as_str(),
                record.amount_m(),
                matched
            );
        }
    }

    if args.verify_labels {
        let labelled = exploits
            .iter()
            .filter(|e| e.record().stored_primitive().is_some())
            .count();
        if labelled == 0 {
            anyhow::bail!("Dataset has no stored primitive labels to verify");
        }

        let drift = label_drift(&exploits);
        if !drift.is_empty() {
            for d in &drift {
                let line = d.line.map(|l| format!("line {}: ", l)).unwrap_or_default();
                eprintln!(
                    "  {}{} stored {} but categorizes as {}",
                    line, d.name, d.stored, d.recomputed
                );
            }
            anyhow::bail!(
                "{} of {} stored labels differ from recomputed labels",
                drift.len(),
                labelled
            );
        }
        eprintln!("All {} stored labels reproduced", labelled);
    }

    Ok(())
}

fn run_profile(session: &Session, args: &ProfileArgs) -> Result<()> {
    let config = session.estimator_config(&args.estimator)?;
    let exploits = session.label(args.estimator.trust_labels);
    let report = estimate(&exploits, &config).context("Base-rate estimation failed")?;

    let profiles = match &args.profiles {
        Some(path) => ProfileSet::from_toml(path)
            .with_context(|| format!("Failed to load vault profiles {}", path.display()))?,
        None => ProfileSet::default_profiles().context("Built-in vault profiles are invalid")?,
    };
    let ranked = profiles.rank(&report)?;

    match args.format {
        OutputFormat::Text => {
            session.print_header();
            println!(
                "Base rates: N={}, T={} years\n",
                report.exposure.vaults, report.exposure.years
            );
            print!("{}", ranking_report(&ranked));
        }
        OutputFormat::Json => {
            let mut output = JsonOutput::new(session.dataset_summary(), report);
            output.set_profiles(ranked);
            println!("{}", output.to_json()?);
        }
        OutputFormat::Csv => print!("{}", csv_output::profiles_csv(&ranked)),
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(cli.debug);

    let session = Session::open(&cli)?;

    match &cli.command {
        Command::BaseRates(args) => run_base_rates(&session, args),
        Command::Categorize(args) => run_categorize(&session, args),
        Command::Profile(args) => run_profile(&session, args),
    }
}
