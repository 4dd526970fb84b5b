//! Command handlers. Each writes either a short text rendering or one JSON
//! document to `out`.

use std::io::Write;

use anyhow::{bail, Context};
use chrono::Utc;
use labeltrack::analytics::{stage_history, state_distribution, time_per_stage};
use labeltrack::layout::{LayoutCalculator, LayoutSnapshot, LayoutSpec};
use labeltrack::store::{NewJob, OrderInfo, TechnicalRecord};
use labeltrack::{
    ClosureReport, Config, Job, JobLifecycle, JobState, PauseReason, ProductionStore, Stage,
    TransitionContext, TransitionReport,
};
use serde::Serialize;
use serde_json::json;

use crate::cli::{ClosureArgs, Command, CreateArgs, JobLayoutArgs, LayoutArgs};

/// Where and how results are printed.
pub struct Output<'a> {
    pub out: &'a mut dyn Write,
    pub json: bool,
}

impl Output<'_> {
    fn emit<T: Serialize>(&mut self, value: &T) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut *self.out, value)?;
        writeln!(self.out)?;
        Ok(())
    }
}

pub fn context(actor: Option<&str>) -> TransitionContext {
    let actor = actor
        .map(str::to_string)
        .or_else(|| std::env::var("USER").ok())
        .filter(|a| !a.trim().is_empty());
    TransitionContext {
        actor,
        at: Utc::now(),
    }
}

/// `layout` needs no database.
pub fn layout(config: &Config, args: &LayoutArgs, output: &mut Output) -> anyhow::Result<()> {
    let calculator = LayoutCalculator::new(config.catalog());
    let recommendation = calculator.recommend_unit(args.repeat, args.repeats)?;
    let unit = args.unit.unwrap_or(recommendation.unit.code);
    if args.unit.is_none() && !recommendation.feasible {
        tracing::warn!(unit, "no cylinder leaves the minimum advance gap");
    }

    let spec = LayoutSpec {
        cavity_width_mm: args.width,
        cavity_gap_mm: args.cavity_gap,
        cavity_count: args.cavities,
        repeat_length_mm: args.repeat,
        repeats_per_revolution: args.repeats,
        unit,
        color_count: args.colors,
        order_quantity: args.quantity,
    };
    let snapshot = calculator.snapshot(&spec)?;
    let rects = if args.rects {
        Some(calculator.render_layout(&spec)?.iter().collect::<Vec<_>>())
    } else {
        None
    };

    if output.json {
        return output.emit(&json!({
            "recommendation": recommendation,
            "spec": snapshot.spec,
            "metrics": snapshot.metrics,
            "summary": snapshot.summary,
            "rects": rects,
        }));
    }

    let out = &mut *output.out;
    writeln!(
        out,
        "Recommended: Z{} ({:.2}mm, gap {:.2}mm){}",
        recommendation.unit.code,
        recommendation.unit.circumference_mm,
        recommendation.advance_gap_mm,
        if recommendation.feasible { "" } else { " [below minimum gap]" }
    )?;
    writeln!(out, "{}", snapshot.summary)?;
    let metrics = &snapshot.metrics;
    writeln!(out, "Circumference: {:.2} mm", metrics.circumference_mm)?;
    writeln!(out, "Advance gap:   {:.2} mm", metrics.advance_gap_mm)?;
    writeln!(out, "Mount width:   {:.2} mm", metrics.mount_width_mm)?;
    writeln!(out, "Material:      {:.2} m", metrics.linear_meters)?;
    writeln!(out, "Plate area:    {:.2} cm2", metrics.plate_area_cm2)?;
    if let Some(rects) = rects {
        for rect in rects {
            writeln!(
                out,
                "{:?} r{} c{} x={:.2} y={:.2} w={:.2} h={:.2}",
                rect.kind, rect.repeat, rect.cavity, rect.x_mm, rect.y_mm, rect.width_mm, rect.height_mm
            )?;
        }
    }
    Ok(())
}

pub fn run<S: ProductionStore>(
    lifecycle: &JobLifecycle<S>,
    config: &Config,
    command: Command,
    ctx: &TransitionContext,
    output: &mut Output,
) -> anyhow::Result<()> {
    match command {
        Command::Layout(args) => layout(config, &args, output),
        Command::Create(args) => create(lifecycle, config, args, ctx, output),
        Command::List { state } => list(lifecycle, state.as_deref(), output),
        Command::Show { id } => show(lifecycle, id, output),
        Command::Advance {
            id,
            stage,
            machine,
            closure,
        } => {
            let job = lifecycle.job(id)?;
            let report = closure_report(&job.state, &closure);
            let result = lifecycle.advance(id, stage, machine.as_deref(), &report, ctx)?;
            transition(&result, output)
        }
        Command::Pause { id, reason } => {
            let result = lifecycle.pause(id, &PauseReason::parse(&reason), ctx)?;
            transition(&result, output)
        }
        Command::Resume { id } => {
            let result = lifecycle.resume(id, ctx)?;
            transition(&result, output)
        }
        Command::Colors { id, units } => {
            let job = lifecycle.update_print_config(id, units)?;
            if output.json {
                return output.emit(&job);
            }
            write_job(output.out, &job)?;
            Ok(())
        }
        Command::History { id } => history(lifecycle, id, output),
        Command::Stats => stats(lifecycle, output),
        Command::Delete { id, yes } => {
            if !yes {
                bail!("deleting job {} removes its whole history; pass --yes to confirm", id);
            }
            lifecycle.delete(id)?;
            if output.json {
                output.emit(&json!({ "deleted": id }))
            } else {
                writeln!(output.out, "Deleted job {}", id)?;
                Ok(())
            }
        }
    }
}

fn create<S: ProductionStore>(
    lifecycle: &JobLifecycle<S>,
    config: &Config,
    args: CreateArgs,
    ctx: &TransitionContext,
    output: &mut Output,
) -> anyhow::Result<()> {
    let layout = job_layout(config, &args.layout, args.quantity)?;
    let new_job = NewJob {
        customer: args.customer,
        name: args.name,
        priority: args.priority.into(),
        order: OrderInfo {
            order_number: args.order_number,
            production_order: args.production_order,
            due_date: args.due,
            quantity: args.quantity,
        },
        technical: TechnicalRecord {
            material: args.material,
            finish: args.finish,
            label_position: args.label_position,
            core_number: args.core,
            quantity_per_core: args.per_core,
            layout,
            die_number: args.die_number,
            plate_number: args.plate_number,
            ..Default::default()
        },
    };
    let result = lifecycle.create_job(&new_job, args.stage, ctx)?;
    transition(&result, output)
}

fn job_layout(
    config: &Config,
    args: &JobLayoutArgs,
    quantity: u64,
) -> anyhow::Result<Option<LayoutSnapshot>> {
    let Some(width) = args.width else {
        return Ok(None);
    };
    let repeat = args.repeat.context("--repeat is required with --width")?;
    let repeats = args.repeats.unwrap_or(1);

    let calculator = LayoutCalculator::new(config.catalog());
    let unit = match args.unit {
        Some(unit) => unit,
        None => calculator.recommend_unit(repeat, repeats)?.unit.code,
    };
    let spec = LayoutSpec {
        cavity_width_mm: width,
        cavity_gap_mm: args.cavity_gap.unwrap_or(0.0),
        cavity_count: args.cavities.unwrap_or(1),
        repeat_length_mm: repeat,
        repeats_per_revolution: repeats,
        unit,
        color_count: args.colors.unwrap_or(1),
        order_quantity: quantity,
    };
    Ok(Some(calculator.snapshot(&spec)?))
}

/// Picks the report shape from the stage being closed. Stage-specific
/// figures that do not apply to that stage are ignored.
pub fn closure_report(closing: &JobState, args: &ClosureArgs) -> ClosureReport {
    let responsible = args.operator.clone();
    let notes = args.notes.clone();
    match closing.stage() {
        Some(Stage::Design) => ClosureReport::Design {
            responsible,
            prepress_supplier: args.supplier.clone(),
            notes,
        },
        Some(Stage::Prepress) => ClosureReport::Prepress { responsible, notes },
        Some(Stage::Printing) => ClosureReport::Printing {
            responsible,
            spool_code: args.spool.clone(),
            printed_meters: args.printed_meters.unwrap_or(0.0),
            scrap_meters: args.scrap_meters.unwrap_or(0.0),
            notes,
        },
        Some(Stage::QualityControl) => ClosureReport::QualityControl {
            responsible,
            cores_used: args.cores.unwrap_or(0),
            notes,
        },
        Some(Stage::DieCutting) => ClosureReport::DieCutting { responsible, notes },
        Some(Stage::Dispatch) => ClosureReport::Dispatch {
            responsible,
            box_count: args.boxes.unwrap_or(0),
            notes,
        },
        _ => ClosureReport::General { responsible, notes },
    }
}

fn transition(result: &TransitionReport, output: &mut Output) -> anyhow::Result<()> {
    if output.json {
        return output.emit(result);
    }
    write_job(output.out, &result.job)?;
    for warning in &result.warnings {
        writeln!(output.out, "warning: {}", warning)?;
    }
    Ok(())
}

fn write_job(out: &mut dyn Write, job: &Job) -> anyhow::Result<()> {
    writeln!(out, "#{} {} / {}", job.id, job.customer, job.name)?;
    writeln!(out, "  state:    {}", job.state)?;
    if let Some(previous) = &job.previous_stage {
        writeln!(out, "  paused in: {}", previous)?;
    }
    writeln!(out, "  priority: {}", job.priority)?;
    if let Some(due) = job.order.due_date {
        writeln!(out, "  due:      {}", due)?;
    }
    if let Some(layout) = &job.technical.layout {
        writeln!(out, "  layout:   {}", layout.summary)?;
    }
    for (station, unit) in job.technical.print_units.iter().enumerate() {
        writeln!(
            out,
            "  unit {}:   anilox {}, {} {}",
            station + 1,
            unit.anilox.as_deref().unwrap_or("-"),
            unit.color_type,
            unit.color_code.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}

fn list<S: ProductionStore>(
    lifecycle: &JobLifecycle<S>,
    state: Option<&str>,
    output: &mut Output,
) -> anyhow::Result<()> {
    let filter = state.map(JobState::parse);
    let jobs: Vec<Job> = lifecycle
        .jobs()?
        .into_iter()
        .filter(|job| filter.as_ref().map_or(true, |state| &job.state == state))
        .collect();

    if output.json {
        return output.emit(&jobs);
    }
    for job in &jobs {
        writeln!(
            output.out,
            "{:>5}  {:<17} {:<7} {} / {}",
            job.id,
            job.state.to_string(),
            job.priority.as_str(),
            job.customer,
            job.name
        )?;
    }
    Ok(())
}

fn show<S: ProductionStore>(
    lifecycle: &JobLifecycle<S>,
    id: i64,
    output: &mut Output,
) -> anyhow::Result<()> {
    let job = lifecycle.job(id)?;
    let next = lifecycle.next_stages(&job);
    let warnings = lifecycle.audit(id)?;

    if output.json {
        return output.emit(&json!({
            "job": job,
            "nextStages": next,
            "warnings": warnings,
        }));
    }
    write_job(output.out, &job)?;
    let names: Vec<&str> = next.iter().map(|s| s.name()).collect();
    writeln!(output.out, "  next:     {}", names.join(", "))?;
    for warning in &warnings {
        writeln!(output.out, "warning: {}", warning)?;
    }
    Ok(())
}

fn history<S: ProductionStore>(
    lifecycle: &JobLifecycle<S>,
    id: i64,
    output: &mut Output,
) -> anyhow::Result<()> {
    let intervals = lifecycle.history(id)?;
    let now = Utc::now();
    let rows = stage_history(&intervals, now);
    let totals = time_per_stage(&intervals, now);

    if output.json {
        return output.emit(&json!({ "intervals": rows, "timePerStage": totals }));
    }
    for row in &rows {
        let closed = row
            .closed_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "open".to_string());
        writeln!(
            output.out,
            "{:<17} {} -> {:<16} {:>9.2} min  {}",
            row.stage,
            row.opened_at.format("%Y-%m-%d %H:%M"),
            closed,
            row.minutes,
            row.machine.as_deref().unwrap_or("-")
        )?;
    }
    writeln!(output.out)?;
    for total in &totals {
        writeln!(output.out, "{:<17} {:>9.2} min", total.stage, total.minutes)?;
    }
    Ok(())
}

fn stats<S: ProductionStore>(lifecycle: &JobLifecycle<S>, output: &mut Output) -> anyhow::Result<()> {
    let counts = state_distribution(&lifecycle.jobs()?);
    if output.json {
        return output.emit(&counts);
    }
    for row in &counts {
        writeln!(output.out, "{:<17} {:>5}", row.state, row.count)?;
    }
    Ok(())
}
