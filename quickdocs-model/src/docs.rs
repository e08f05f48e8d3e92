//! Documentation artifacts produced by the LLM pipeline.
//!
//! Field names mirror the tool schemas the LLM is asked to fill, so these
//! types deserialize straight from tool output. Fields the schemas mark as
//! required have no `#[serde(default)]`; their absence is a structural
//! failure the pipeline treats as non-retryable.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupGuide {
    pub prerequisites: String,
    pub installation: String,
    #[serde(default)]
    pub configuration: String,
    pub running: String,
    #[serde(default)]
    pub testing: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemOverview {
    pub description: String,
    pub purpose: String,
    pub key_features: Vec<String>,
    pub getting_started: String,
    pub main_language: String,
    pub repo_type: String,
    #[serde(default)]
    pub setup_guide: SetupGuide,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExport {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

/// Per-module documentation from the module analysis stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleAnalysis {
    pub module_name: String,
    pub description: String,
    pub key_exports: Vec<KeyExport>,
    pub internal_dependencies: Vec<String>,
    #[serde(rename = "publicAPI", alias = "publicApi")]
    pub public_api: Vec<String>,
    pub source_files: Vec<String>,
    /// Chunk directory the analysis came from; filled in by the pipeline,
    /// not the model.
    #[serde(default)]
    pub module_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    pub description: String,
    pub path: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagram {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Architecture {
    pub description: String,
    #[serde(default)]
    pub components: Vec<Component>,
    pub data_flow: String,
    #[serde(default)]
    pub diagrams: Vec<Diagram>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechStack {
    pub languages: Vec<String>,
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub databases: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub infrastructure: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPointItem {
    pub name: String,
    pub path: String,
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoints {
    pub main: Vec<EntryPointItem>,
    #[serde(default)]
    pub cli: Vec<EntryPointItem>,
    #[serde(default)]
    pub api: Vec<EntryPointItem>,
    #[serde(default)]
    pub config: Vec<EntryPointItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDependency {
    pub name: String,
    pub purpose: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependencies {
    pub runtime: Vec<String>,
    #[serde(default)]
    pub dev: Vec<String>,
    pub key: Vec<KeyDependency>,
}

/// Cross-cutting documentation from the synthesis stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisResult {
    pub architecture: Architecture,
    pub tech_stack: TechStack,
    pub entry_points: EntryPoints,
    pub dependencies: Dependencies,
}

/// The terminal artifact of an indexing job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Documentation {
    pub system_overview: SystemOverview,
    pub key_modules: Vec<ModuleAnalysis>,
    pub architecture: Architecture,
    pub tech_stack: TechStack,
    pub entry_points: EntryPoints,
    pub dependencies: Dependencies,
    pub repo_context: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overview_requires_description() {
        let err = serde_json::from_str::<SystemOverview>(
            r#"{"purpose":"p","keyFeatures":[],"gettingStarted":"g","mainLanguage":"go","repoType":"cli"}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn overview_tolerates_missing_optional_setup_fields() {
        let overview: SystemOverview = serde_json::from_str(
            r#"{
                "description":"d","purpose":"p","keyFeatures":["f"],
                "gettingStarted":"g","mainLanguage":"go","repoType":"cli",
                "setupGuide":{"prerequisites":"go 1.22","installation":"go install","running":"./bin"}
            }"#,
        )
        .unwrap();
        assert_eq!(overview.setup_guide.configuration, "");
        assert_eq!(overview.setup_guide.testing, "");
    }

    #[test]
    fn module_analysis_round_trips_public_api_casing() {
        let module: ModuleAnalysis = serde_json::from_str(
            r#"{
                "moduleName":"auth","description":"d","keyExports":[],
                "internalDependencies":[],"publicAPI":["login()"],"sourceFiles":["src/auth.ts"]
            }"#,
        )
        .unwrap();
        assert_eq!(module.public_api, vec!["login()"]);
        let back = serde_json::to_value(&module).unwrap();
        assert!(back.get("publicAPI").is_some());
    }
}
