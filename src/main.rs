//! rsmcheck: check recursive state machines against CTL properties.

mod cmdline;
mod limits;

use cmdline::Opts;
use rsmcheck_check::logging::{self, LoggingConfig, debug, info};
use rsmcheck_check::{CheckConfig, Checker, Strategy};
use rsmcheck_frontend::{CtlParser, parse_rsm};
use rsmcheck_ir::FormulaStore;
use rsmcheck_utils::RsmResult;
use std::time::Instant;

fn main() -> RsmResult<()> {
    let opts: Opts = argh::from_env();

    let logger = logging::initialize_logger(&LoggingConfig {
        logfile: opts.logfile.clone(),
        overwrite: opts.overwrite,
    })?;
    limits::install(opts.maxmem, opts.maxtime, &logger);

    info!(logger, "---------------------------------");
    info!(logger, "--- STARTING TO CHECK NEW RSM ---");
    info!(logger, "---------------------------------");
    info!(
        logger,
        "{} {}",
        opts.rsm_file.display(),
        opts.ctl_file.display()
    );
    println!(
        "Checking RSM {} against properties {}",
        opts.rsm_file.display(),
        opts.ctl_file.display()
    );
    info!(
        logger,
        "using {} approach",
        if opts.exhaustive { "exhaustive" } else { "lazy" }
    );

    let config = CheckConfig {
        strategy: if opts.exhaustive {
            Strategy::Exhaustive
        } else {
            Strategy::Lazy
        },
        heuristic: opts.expansion_heuristic,
        randomize: opts.randomize_nondeterminism,
    };

    let mut store = FormulaStore::new();
    let formulas = CtlParser::parse_file(&opts.ctl_file, &mut store)?;

    let total_start = Instant::now();
    let mut num_true = 0u64;
    let mut num_false = 0u64;

    for (index, &root) in formulas.iter().enumerate() {
        println!("checking CTL {}", index + 1);
        info!(logger, "--- STARTING TO CHECK NEW FORMULA ---");

        // checking mutates the machine, so every formula starts from a
        // freshly parsed one
        let parse_start = Instant::now();
        let mut machine = parse_rsm(&opts.rsm_file)?;
        let parsed_instances = machine.live_instances().len();
        machine.remove_unreachable();
        debug!(
            logger,
            "Uncontextualised RSM has {} components (of which {} are \
             unreachable) and {} nodes",
            parsed_instances,
            parsed_instances - machine.live_instances().len(),
            machine.state_count()
        );

        let check_start = Instant::now();
        let result = {
            let mut checker = Checker::new(
                &mut machine,
                &store,
                config,
                logger.clone(),
            );
            checker.check(root)
        };
        if result {
            num_true += 1;
        } else {
            num_false += 1;
        }

        debug!(
            logger,
            "    Final unpacked RSM has {} components with a total of {} \
             states",
            machine.live_instances().len(),
            machine.state_count()
        );
        let verdict = format!(
            "{result}: {} does{} hold in {} (component {})",
            store.display(root),
            if result { "" } else { " not" },
            machine.node(machine.initial_node()).name,
            machine.instance(machine.initial_instance()).name
        );
        info!(logger, "{}", verdict);
        println!("{verdict}");
        info!(
            logger,
            "    Parsing took {:.3} seconds",
            (check_start - parse_start).as_secs_f64()
        );
        info!(
            logger,
            "    Checking took {:.3} seconds",
            check_start.elapsed().as_secs_f64()
        );
    }

    info!(
        logger,
        "Took a total of {:.3} seconds",
        total_start.elapsed().as_secs_f64()
    );
    info!(
        logger,
        "Found {} true formulas and {} false formulas.", num_true, num_false
    );

    Ok(())
}
