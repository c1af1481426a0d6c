//! Command dispatch

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::services::{CaseListService, ExportOutcome, ExportRequest, ExportService};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings, LOCAL_CONFIG_FILE};
use crate::domain::{ExtractMode, RootTagPolicy, TagId, TagVocabulary, ToTree};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, see `mindtab --help`".into(),
        ));
    };

    // Completion and config templates must work even with a broken config
    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "mindtab", &mut io::stdout());
            return Ok(());
        }
        Commands::Config {
            command: ConfigCommands::Init { global },
        } => return config_init(*global),
        Commands::Config {
            command: ConfigCommands::Path,
        } => return config_path(cli.config.as_deref()),
        _ => {}
    }

    let settings = Settings::load(cli.config.as_deref())?;
    let container = ServiceContainer::new(settings);

    match command {
        Commands::Tags { all } => tags(&container, *all),
        Commands::Analyze { document, json } => analyze(&container, document, *json),
        Commands::Filter {
            document,
            tags,
            retain_tagged_root,
        } => filter(&container, document, tags, *retain_tagged_root),
        Commands::Cases {
            document,
            tags,
            output,
            retain_tagged_root,
            fail_on_empty,
        } => cases(
            &container,
            document,
            tags,
            output.as_deref(),
            *retain_tagged_root,
            *fail_on_empty,
        ),
        Commands::Export {
            document,
            cases,
            tags,
            output,
            leaves,
            retain_tagged_root,
            fail_on_empty,
            preview,
        } => {
            let source = match (document, cases) {
                (Some(doc), None) => Source::Document(doc),
                (None, Some(cases)) => Source::Cases(cases),
                _ => {
                    return Err(CliError::InvalidArgs(
                        "give either a document or --cases".into(),
                    ))
                }
            };
            export(
                &container,
                source,
                tags,
                ExportFlags {
                    output: output.as_deref(),
                    leaves: *leaves,
                    retain_tagged_root: *retain_tagged_root,
                    fail_on_empty: *fail_on_empty,
                    preview: *preview,
                },
            )
        }
        Commands::Config {
            command: ConfigCommands::Show,
        } => config_show(&container.settings),
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}

/// Map user-typed tag names onto vocabulary ids. Unknown names are kept
/// verbatim so custom markers stay selectable.
fn resolve_tags(vocabulary: &TagVocabulary, raw: &[String]) -> Vec<TagId> {
    raw.iter()
        .filter(|r| !r.trim().is_empty())
        .map(|r| match vocabulary.resolve(r) {
            Some(id) => id,
            None => {
                output::warning(&format!("unknown tag {:?}, matching it literally", r));
                TagId::new(r.trim())
            }
        })
        .collect()
}

fn root_policy(retain_tagged_root: bool, settings: &Settings) -> RootTagPolicy {
    if retain_tagged_root {
        RootTagPolicy::Retain
    } else {
        settings.root_tag_policy
    }
}

fn tags(container: &ServiceContainer, all: bool) -> CliResult<()> {
    for def in container.vocabulary.definitions() {
        output::info(&output::tag_line(&def.id, &def.label));
        if all && !def.aliases.is_empty() {
            output::detail(&def.aliases.join(", "));
        }
    }
    Ok(())
}

#[instrument(level = "debug", skip(container))]
fn analyze(container: &ServiceContainer, document: &Path, json: bool) -> CliResult<()> {
    let analysis = container.analyze_service().analyze(document)?;

    if json {
        let rendered = serde_json::to_string_pretty(&analysis)
            .map_err(|e| InfraError::json("serialize tag analysis", e))?;
        output::info(&rendered);
        return Ok(());
    }

    output::header(&analysis.source_name);
    output::action("sheets", &analysis.sheets);
    output::action("nodes", &analysis.total_nodes);
    if analysis.tags.is_empty() {
        output::warning("no recognized tags in document");
    }
    for stat in &analysis.tags {
        let label = stat.label.as_deref().unwrap_or("");
        output::info(&format!(
            "{}: {}",
            output::tag_line(stat.tag.as_str(), label),
            stat.count
        ));
        if !stat.samples.is_empty() {
            output::detail(&stat.samples.join(", "));
        }
    }
    Ok(())
}

#[instrument(level = "debug", skip(container))]
fn filter(
    container: &ServiceContainer,
    document: &Path,
    raw_tags: &[String],
    retain_tagged_root: bool,
) -> CliResult<()> {
    let tags = resolve_tags(&container.vocabulary, raw_tags);
    let policy = root_policy(retain_tagged_root, &container.settings);
    let (forest, report) = container.export_service().filter(document, &tags, policy)?;

    for sheet in &forest.sheets {
        output::header(&sheet.title);
        output::info(&sheet.to_tree());
    }
    output::action("sheets processed", &report.sheets_processed);
    output::action("sheets removed", &report.sheets_removed);
    output::action("nodes removed", &report.nodes_removed);
    if forest.is_empty() {
        output::warning("no sheet survived the filter");
    }
    Ok(())
}

enum Source<'a> {
    Document(&'a Path),
    Cases(&'a Path),
}

struct ExportFlags<'a> {
    output: Option<&'a Path>,
    leaves: bool,
    retain_tagged_root: bool,
    fail_on_empty: bool,
    preview: bool,
}

#[instrument(level = "debug", skip(container, source, flags))]
fn export(
    container: &ServiceContainer,
    source: Source<'_>,
    raw_tags: &[String],
    flags: ExportFlags<'_>,
) -> CliResult<()> {
    let settings = &container.settings;
    let mut request = ExportRequest::new(resolve_tags(&container.vocabulary, raw_tags), settings);
    request.policy = root_policy(flags.retain_tagged_root, settings);
    if flags.leaves {
        request.mode = ExtractMode::Leaves;
    }

    let service = container.export_service();
    let (outcome, source_path) = match source {
        Source::Document(path) => (service.export_document(path, &request)?, path),
        Source::Cases(path) => (service.export_cases(path, &request)?, path),
    };
    report_outcome(&outcome, flags.preview);

    if outcome.is_empty() {
        let msg = format!("no records in {} match the selected tags", source_path.display());
        if flags.fail_on_empty {
            return Err(CliError::EmptyResult(msg));
        }
        output::warning(&msg);
    }

    match target_path(flags.output, settings.output_dir.as_deref(), source_path, "plan") {
        Some(path) => {
            service.write_plan(&outcome.plan, &path)?;
            output::success(&format!(
                "{} rows, {} merge regions → {}",
                outcome.plan.rows.len(),
                outcome.plan.regions.len(),
                path.display()
            ));
        }
        None => output::info(&ExportService::render_plan(&outcome.plan)?),
    }
    Ok(())
}

fn report_outcome(outcome: &ExportOutcome, preview: bool) {
    if let Some(report) = &outcome.report {
        debug!(
            "export: {} sheets removed, {} nodes removed",
            report.sheets_removed, report.nodes_removed
        );
    }
    if preview {
        eprintln!("{}", outcome.groups.to_tree());
    }
}

#[instrument(level = "debug", skip(container))]
fn cases(
    container: &ServiceContainer,
    document: &Path,
    raw_tags: &[String],
    output: Option<&Path>,
    retain_tagged_root: bool,
    fail_on_empty: bool,
) -> CliResult<()> {
    let tags = resolve_tags(&container.vocabulary, raw_tags);
    let policy = root_policy(retain_tagged_root, &container.settings);
    let service = container.case_list_service();
    let list = service.build(document, &tags, policy)?;

    let total = list.smoke_test_suite.metadata.total_cases;
    if total == 0 {
        let msg = format!("no smoke cases derived from {}", document.display());
        if fail_on_empty {
            return Err(CliError::EmptyResult(msg));
        }
        output::warning(&msg);
    }

    match target_path(output, container.settings.output_dir.as_deref(), document, "cases") {
        Some(path) => {
            service.write(&list, &path)?;
            output::success(&format!("{} cases → {}", total, path.display()));
        }
        None => output::info(&CaseListService::render(&list)?),
    }
    Ok(())
}

/// Explicit output wins; otherwise `output_dir` gets `<stem>.<kind>.json`;
/// otherwise stdout.
fn target_path(
    output: Option<&Path>,
    output_dir: Option<&Path>,
    source: &Path,
    kind: &str,
) -> Option<PathBuf> {
    if let Some(path) = output {
        return Some(path.to_path_buf());
    }
    let dir = output_dir?;
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "export".into());
    Some(dir.join(format!("{stem}.{kind}.json")))
}

fn config_show(settings: &Settings) -> CliResult<()> {
    output::info(&settings.to_toml()?);
    Ok(())
}

fn config_init(global: bool) -> CliResult<()> {
    let path = if global {
        global_config_path().ok_or_else(|| {
            CliError::Usage("cannot determine global config directory".into())
        })?
    } else {
        PathBuf::from(LOCAL_CONFIG_FILE)
    };

    write_template(&RealFileSystem, &path)?;
    output::success(&format!("created {}", path.display()));
    Ok(())
}

/// Write the config template, refusing to overwrite an existing file.
fn write_template(fs: &dyn FileSystem, path: &Path) -> CliResult<()> {
    if fs.exists(path) {
        return Err(CliError::Usage(format!(
            "config already exists: {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs.create_dir_all(parent)
            .map_err(|e| InfraError::io(format!("create {}", parent.display()), e))?;
    }
    fs.write(path, &Settings::template())
        .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
    Ok(())
}

fn config_path(explicit: Option<&Path>) -> CliResult<()> {
    let fs = RealFileSystem;
    let describe = |p: &Path| {
        let state = if fs.exists(p) { "exists" } else { "missing" };
        format!("{} ({})", p.display(), state)
    };

    match global_config_path() {
        Some(p) => output::action("global", &describe(&p)),
        None => output::action("global", &"unavailable"),
    }
    let local = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let cwd = std::env::current_dir()
                .map_err(|e| InfraError::io("current directory", e))?;
            local_config_path(&cwd)
        }
    };
    output::action("local", &describe(&local));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_no_output_and_no_dir_when_targeting_then_uses_stdout() {
        assert_eq!(target_path(None, None, Path::new("a.json"), "plan"), None);
    }

    #[test]
    fn given_output_dir_when_targeting_then_derives_name_from_source() {
        let target = target_path(
            None,
            Some(Path::new("/tmp/out")),
            Path::new("docs/suite.json"),
            "plan",
        );
        assert_eq!(target, Some(PathBuf::from("/tmp/out/suite.plan.json")));

        let target = target_path(None, Some(Path::new("/tmp/out")), Path::new("suite.json"), "cases");
        assert_eq!(target, Some(PathBuf::from("/tmp/out/suite.cases.json")));
    }

    #[test]
    fn given_missing_config_dir_when_writing_template_then_creates_it_and_refuses_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/conf/mindtab.toml");

        write_template(&RealFileSystem, &path).unwrap();
        let again = write_template(&RealFileSystem, &path);

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, Settings::template());
        assert!(matches!(again, Err(CliError::Usage(_))));
    }

    #[test]
    fn given_alias_when_resolving_tags_then_maps_to_vocabulary_id() {
        let vocab = TagVocabulary::default();
        let tags = resolve_tags(&vocab, &["P1".to_string(), "custom-x".to_string()]);
        assert_eq!(tags, vec![TagId::from("priority-1"), TagId::from("custom-x")]);
    }
}
