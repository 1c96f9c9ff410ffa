//! Per-invocation context shared by commands: project, config, registry and collaborators

use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::error::CommandError;
use crate::cli::GlobalOpts;
use crate::core::{
    AuditEvent, AuditSink, Config, JsonlAuditSink, NullAuditSink, Project, ProjectError,
    SqliteNameIndex, TeamRoster,
};
use crate::naming::registry::{builtin_patterns, load_pattern_dir};
use crate::naming::{PatternRegistry, RegistryHandle};

pub struct Session {
    project: Option<Project>,
    config: Config,
    audit: Box<dyn AuditSink>,
}

impl Session {
    /// Open the session; running outside a project is allowed
    pub fn open(global: &GlobalOpts) -> Result<Self, CommandError> {
        let project = match &global.project {
            Some(root) => Some(Project::discover_from(root)?),
            None => match Project::discover() {
                Ok(project) => Some(project),
                Err(ProjectError::NotFound(_)) => None,
                Err(e) => return Err(e.into()),
            },
        };

        let config = Config::load(project.as_ref().map(|p| p.root()))?;

        let audit: Box<dyn AuditSink> = match &project {
            Some(project) if config.audit.enabled => {
                Box::new(JsonlAuditSink::new(project.resolve(&config.audit.path)))
            }
            _ => Box::new(NullAuditSink),
        };

        tracing::debug!(
            project = ?project.as_ref().map(|p| p.root().display().to_string()),
            "session opened"
        );

        Ok(Self {
            project,
            config,
            audit,
        })
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    pub fn require_project(&self) -> Result<&Project, CommandError> {
        match &self.project {
            Some(project) => Ok(project),
            None => {
                let cwd = std::env::current_dir()?;
                Err(ProjectError::NotFound(cwd).into())
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn author(&self) -> String {
        self.config.author()
    }

    /// Directory holding the project's pattern documents
    pub fn patterns_dir(&self) -> Option<PathBuf> {
        self.project
            .as_ref()
            .map(|p| p.patterns_dir(&self.config))
    }

    /// Build the registry snapshot for this invocation
    ///
    /// Outside a project, or when the project has no patterns directory, the
    /// builtin patterns are used.
    pub fn registry(&self) -> Result<RegistryHandle, CommandError> {
        let mut patterns = Vec::new();
        let mut use_builtin = self.config.include_builtin_patterns;

        match self.patterns_dir() {
            Some(dir) if dir.is_dir() => patterns.extend(load_pattern_dir(&dir)?),
            _ => use_builtin = true,
        }
        if use_builtin {
            patterns.extend(builtin_patterns()?);
        }

        Ok(RegistryHandle::new(PatternRegistry::load(patterns)?))
    }

    pub fn snapshot(&self) -> Result<Arc<PatternRegistry>, CommandError> {
        Ok(self.registry()?.snapshot())
    }

    /// The team roster, when the project has one
    pub fn teams(&self) -> Result<Option<TeamRoster>, CommandError> {
        match &self.project {
            Some(project) if project.teams_path().is_file() => {
                Ok(Some(TeamRoster::load(&project.teams_path())?))
            }
            _ => Ok(None),
        }
    }

    /// The project's name index, when inside a project
    pub fn name_index(&self) -> Result<Option<SqliteNameIndex>, CommandError> {
        match &self.project {
            Some(project) => {
                let path = project.resolve(&self.config.naming_index.path);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Ok(Some(SqliteNameIndex::open(&path)?))
            }
            None => Ok(None),
        }
    }

    /// Record an audit event; a failing sink never fails the command
    pub fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(&event) {
            tracing::warn!(action = %event.action, error = %e, "audit event not recorded");
        }
    }
}
