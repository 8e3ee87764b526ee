//! The batch driver: compiles every model, writes generated sources, and
//! accumulates diagnostics.
//!
//! Models are independent, so the driver compiles them on scoped threads;
//! the diagnostic sink is the only shared mutable state and sits behind a
//! single mutex. A fatal error abandons its model only; the batch always
//! runs to completion, and the caller decides the exit code from
//! [`BatchReport::success`].

use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;

use tracing::{debug, info};

use crate::compiler::diagnostics::{Diagnostic, DiagnosticSink};
use crate::compiler::loader::ResourceLoader;
use crate::compiler::{ModelUnit, compile_model};
use crate::descriptor::DescriptorCatalog;

pub struct Driver {
    catalog: DescriptorCatalog,
    out_dir: PathBuf,
}

/// What one batch produced.
#[derive(Debug)]
pub struct BatchReport {
    pub diagnostics: Vec<Diagnostic>,
    /// Paths of the generated source files, unordered.
    pub generated: Vec<PathBuf>,
}

impl BatchReport {
    pub fn success(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.severity == crate::compiler::diagnostics::Severity::Error)
    }
}

impl Driver {
    pub fn new(catalog: DescriptorCatalog, out_dir: impl Into<PathBuf>) -> Self {
        Self { catalog, out_dir: out_dir.into() }
    }

    pub fn run(&self, models: &[ModelUnit], resources: &(dyn ResourceLoader + Sync)) -> BatchReport {
        let sink = Mutex::new(DiagnosticSink::new());
        let generated = Mutex::new(Vec::new());

        if let Err(e) = std::fs::create_dir_all(&self.out_dir) {
            let mut sink = sink.into_inner().expect("unpoisoned");
            sink.push(Diagnostic::error(
                self.out_dir.display().to_string(),
                None,
                format!("cannot create output directory: {e}"),
            ));
            return BatchReport { diagnostics: sink.into_entries(), generated: Vec::new() };
        }

        let sink_ref = &sink;
        let generated_ref = &generated;
        thread::scope(|scope| {
            for unit in models {
                scope.spawn(move || self.compile_one(unit, resources, sink_ref, generated_ref));
            }
        });

        BatchReport {
            diagnostics: sink.into_inner().expect("unpoisoned").into_entries(),
            generated: generated.into_inner().expect("unpoisoned"),
        }
    }

    fn compile_one(
        &self,
        unit: &ModelUnit,
        resources: &(dyn ResourceLoader + Sync),
        sink: &Mutex<DiagnosticSink>,
        generated: &Mutex<Vec<PathBuf>>,
    ) {
        let file = self.diagnostic_file(unit);
        debug!(model = %unit.type_name, "compiling");

        let Some(model) = self.catalog.get(&unit.type_name) else {
            self.report(sink, Diagnostic::error(
                file,
                None,
                format!(
                    "model type `{}` is not in the descriptor catalog (declared at {})",
                    unit.type_name, unit.declared_at
                ),
            ));
            return;
        };

        match compile_model(unit, model.clone(), resources) {
            Ok(artifact) => {
                for warning in &artifact.warnings {
                    self.report(sink, Diagnostic::warning(&file, None, warning.clone()));
                }
                let path = self.out_dir.join(&artifact.file_name);
                match std::fs::write(&path, &artifact.source) {
                    Ok(()) => {
                        info!(
                            model = %unit.type_name,
                            template = %artifact.template_source,
                            file = %path.display(),
                            "generated renderer"
                        );
                        generated.lock().expect("unpoisoned").push(path);
                    }
                    Err(e) => {
                        self.report(sink, Diagnostic::error(
                            path.display().to_string(),
                            None,
                            format!("cannot write generated source: {e}"),
                        ));
                    }
                }
            }
            Err(error) => {
                let mut diagnostic = Diagnostic::from_compile_error(&file, &error);
                diagnostic.message =
                    format!("{} (model `{}` at {})", diagnostic.message, unit.type_name, unit.declared_at);
                self.report(sink, diagnostic);
            }
        }
    }

    fn report(&self, sink: &Mutex<DiagnosticSink>, diagnostic: Diagnostic) {
        sink.lock().expect("unpoisoned").push(diagnostic);
    }

    /// Best-effort file label for diagnostics: the configured template path
    /// when there is one, `<inline>` otherwise.
    fn diagnostic_file(&self, unit: &ModelUnit) -> String {
        if !unit.config.path.is_empty() {
            unit.config.remap_path(&unit.config.path)
        } else if !unit.config.template.is_empty() {
            "<inline>".to_string()
        } else {
            format!("{}.mustache", unit.simple_name())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::loader::MemoryLoader;
    use crate::config::TemplateConfig;
    use crate::descriptor::TypeDescriptor;

    fn catalog() -> DescriptorCatalog {
        let mut catalog = DescriptorCatalog::new();
        catalog.insert(
            TypeDescriptor::record("Hello")
                .field("message", TypeDescriptor::text())
                .build(),
        );
        catalog
    }

    fn unit(type_name: &str, template: &str) -> ModelUnit {
        ModelUnit {
            type_name: type_name.to_string(),
            config: TemplateConfig {
                template: template.to_string(),
                ..TemplateConfig::default()
            },
            declared_at: "tests".to_string(),
        }
    }

    #[test]
    fn batch_writes_files_and_reports_success() {
        let dir = tempfile::tempdir().expect("tempdir");
        let driver = Driver::new(catalog(), dir.path());
        let report = driver.run(&[unit("Hello", "hi {{message}}")], &MemoryLoader::new());

        assert!(report.success(), "diagnostics: {:?}", report.diagnostics);
        assert_eq!(report.generated.len(), 1);
        let source = std::fs::read_to_string(&report.generated[0]).expect("read");
        assert!(source.contains("pub struct HelloRenderer;"));
    }

    #[test]
    fn one_broken_model_does_not_abort_the_batch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let driver = Driver::new(catalog(), dir.path());
        let report = driver.run(
            &[
                unit("Hello", "{{no_such_name}}"),
                unit("Hello", "ok {{message}}"),
            ],
            &MemoryLoader::new(),
        );

        assert!(!report.success());
        assert_eq!(report.generated.len(), 1, "the healthy model still compiles");
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].to_string().contains("no_such_name"));
    }

    #[test]
    fn unused_partial_mapping_is_a_warning_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let driver = Driver::new(catalog(), dir.path());
        let mut unit = unit("Hello", "{{message}}");
        unit.config.partials.push(crate::config::PartialMapping {
            name: "orphan".to_string(),
            template: "x".to_string(),
            path: String::new(),
        });
        let report = driver.run(&[unit], &MemoryLoader::new());

        assert!(report.success(), "warnings do not fail the batch");
        assert_eq!(report.generated.len(), 1);
        assert!(
            report
                .diagnostics
                .iter()
                .any(|d| d.severity == crate::compiler::diagnostics::Severity::Warning
                    && d.message.contains("orphan"))
        );
    }

    #[test]
    fn unknown_model_type_is_reported_with_its_site() {
        let dir = tempfile::tempdir().expect("tempdir");
        let driver = Driver::new(catalog(), dir.path());
        let report = driver.run(&[unit("Ghost", "x")], &MemoryLoader::new());

        assert!(!report.success());
        assert!(report.diagnostics[0].message.contains("Ghost"));
        assert!(report.diagnostics[0].message.contains("tests"));
    }
}
