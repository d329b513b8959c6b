use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};
use serde::Serialize;

use npu_perf::{
    FormulaCtx, FormulaRegistry, Generation, ParamTable, PerfOutputInfo, PerfQuery, PipeType, SocProfile,
    TensorShapeInfo,
};
use npu_perf_expr::{Bindings, Expr, Symbol};

/// Symbolic cost estimator for NPU instructions
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Operator (or micro instruction with --micro) to cost
    op: String,

    /// Input operand, e.g. `[16,n]:float16@gm/[64,1]`
    #[arg(short, long = "input", value_parser = parse_operand)]
    inputs: Vec<TensorShapeInfo>,

    /// Output operand, same syntax as --input
    #[arg(short, long = "output", value_parser = parse_operand)]
    outputs: Vec<TensorShapeInfo>,

    /// Look the op up in the micro-instruction registry
    #[arg(long)]
    micro: bool,

    /// Hardware generation: v2 or v3
    #[arg(long)]
    generation: Option<Generation>,

    /// JSON parameter table overriding the built-in coefficients
    #[arg(long)]
    params: Option<PathBuf>,

    /// Fix the core count instead of leaving `block_dim` symbolic
    #[arg(long)]
    cores: Option<u32>,

    /// Bind a symbol and evaluate numerically, e.g. `block_dim=8`
    #[arg(long = "set", value_parser = parse_binding)]
    set: Vec<(String, Expr)>,

    /// Print costs with every case placeholder inlined
    #[arg(long)]
    resolve: bool,

    /// Emit a JSON report
    #[arg(long)]
    json: bool,
}

fn parse_operand(s: &str) -> Result<TensorShapeInfo, String> {
    s.parse().map_err(|e: npu_perf::PerfError| e.to_string())
}

fn parse_binding(s: &str) -> Result<(String, Expr), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid binding '{s}', expected NAME=VALUE"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("invalid binding '{s}', empty name"));
    }
    let value: Expr = value.parse().map_err(|e| format!("{e}"))?;
    Ok((name.to_string(), value))
}

#[derive(Serialize)]
struct Report {
    op: String,
    generation: Option<String>,
    pipes: BTreeMap<PipeType, String>,
    pending: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<BTreeMap<PipeType, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cycles: Option<BTreeMap<PipeType, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_cycles: Option<f64>,
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    // 1. Coefficients.
    let mut params = ParamTable::builtin().clone();
    if let Some(path) = &cli.params {
        let text = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let table = ParamTable::from_json(&text)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to load {}", path.display()))?;
        params.extend(table);
    }

    // 2. Hardware profile.
    let mut soc = SocProfile::for_generation(cli.generation);
    if let Some(cores) = cli.cores {
        soc = soc.with_core_count(cores);
    }

    // 3. Formula lookup.
    let registry = if cli.micro {
        npu_perf::builtin_micro_registry()
    } else {
        npu_perf::builtin_graph_registry()
    };
    if registry.get_perf_func_tagged(&cli.op, cli.generation).is_none() {
        return Err(miette::miette!(
            "unknown operator '{}' (available: {})",
            cli.op,
            known_ops(registry)
        ));
    }

    // 4. Estimate.
    let query = PerfQuery {
        op_type: cli.op.clone(),
        inputs: cli.inputs.clone(),
        outputs: cli.outputs.clone(),
        node: None,
    };
    let ctx = FormulaCtx::new(&params, &soc);
    let out = npu_perf::estimate(registry, &ctx, &query, cli.generation)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to cost {}", cli.op))?;
    log::debug!("{} pipe(s), {} pending case(s)", out.pipe_costs.len(), out.pending.len());

    // 5. Optional expansion and evaluation.
    let resolved = if cli.resolve {
        Some(out.try_expanded().into_diagnostic().wrap_err("case resolution failed")?)
    } else {
        None
    };
    let cycles = if cli.set.is_empty() {
        None
    } else {
        let env: Bindings = cli
            .set
            .iter()
            .map(|(name, value)| (Symbol::new(name.as_str()), value.clone()))
            .collect();
        let values = out
            .evaluate(&env)
            .into_diagnostic()
            .wrap_err("evaluation failed")?;
        Some(values.into_iter().map(|(pipe, n)| (pipe, n.to_f64())).collect::<BTreeMap<_, _>>())
    };

    // 6. Report.
    if cli.json {
        let report = build_report(&cli, &out, resolved, cycles);
        let text = serde_json::to_string_pretty(&report).into_diagnostic()?;
        println!("{text}");
        return Ok(());
    }
    match &resolved {
        Some(pipes) => {
            for (pipe, cost) in pipes {
                println!("{pipe}: {cost}");
            }
        }
        None => print!("{out}"),
    }
    if let Some(cycles) = &cycles {
        println!();
        for (pipe, n) in cycles {
            println!("{pipe}: {n}");
        }
        println!("total: {}", max_cycles(cycles));
    }
    Ok(())
}

fn known_ops(registry: &FormulaRegistry) -> String {
    let mut names: Vec<&str> = registry.keys().map(|k| k.name.as_str()).collect();
    names.dedup();
    names.join(", ")
}

fn max_cycles(cycles: &BTreeMap<PipeType, f64>) -> f64 {
    cycles.values().copied().fold(0.0, f64::max)
}

fn build_report(
    cli: &Cli,
    out: &PerfOutputInfo,
    resolved: Option<BTreeMap<PipeType, Expr>>,
    cycles: Option<BTreeMap<PipeType, f64>>,
) -> Report {
    let text = |pipes: &BTreeMap<PipeType, Expr>| -> BTreeMap<PipeType, String> {
        pipes.iter().map(|(p, c)| (*p, c.to_string())).collect()
    };
    Report {
        op: cli.op.clone(),
        generation: cli.generation.map(|g| g.to_string()),
        pipes: text(&out.pipe_costs),
        pending: out
            .pending
            .iter()
            .map(|(sym, def)| (sym.to_string(), def.to_string()))
            .collect(),
        resolved: resolved.as_ref().map(text),
        total_cycles: cycles.as_ref().map(max_cycles),
        cycles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_syntax() {
        let (name, value) = parse_binding("block_dim=8").unwrap();
        assert_eq!(name, "block_dim");
        assert_eq!(value, Expr::from(8));
        assert!(parse_binding("block_dim").is_err());
        assert!(parse_binding("=3").is_err());
    }

    #[test]
    fn operand_syntax() {
        let t = parse_operand("[16,n]:float16@ub").unwrap();
        assert_eq!(t.rank(), 2);
        assert!(parse_operand("[16]:complex").is_err());
    }

    #[test]
    fn cli_parses() {
        let cli = Cli::try_parse_from([
            "npu-perf",
            "Load",
            "-i",
            "[16,32]:float16@gm/[64,1]",
            "-o",
            "[16,32]:float16@ub",
            "--generation",
            "v2",
            "--set",
            "block_dim=8",
        ])
        .unwrap();
        assert_eq!(cli.generation, Some(Generation::V2));
        assert_eq!(cli.inputs.len(), 1);
        assert_eq!(cli.set.len(), 1);
        assert!(!cli.micro);
    }

    #[test]
    fn unknown_ops_list_known_keys() {
        let listed = known_ops(npu_perf::builtin_graph_registry());
        assert!(listed.contains("Broadcast"));
        assert_eq!(listed.matches("Exp,").count(), 1);
    }
}
