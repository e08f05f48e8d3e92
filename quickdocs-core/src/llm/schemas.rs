//! Tool definitions whose input schemas enforce the documentation shapes.

use serde_json::json;

use super::backend::ToolDefinition;

pub(super) fn system_overview_tool() -> ToolDefinition {
    ToolDefinition {
        name: "generate_system_overview".to_string(),
        description: "Generate a comprehensive system overview for a source repository."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "A concise 2-3 sentence description of what this repository does."
                },
                "purpose": {
                    "type": "string",
                    "description": "The primary purpose and problem this project solves."
                },
                "keyFeatures": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "5-10 key features or capabilities of the project."
                },
                "gettingStarted": {
                    "type": "string",
                    "description": "Brief getting started guide (install + basic usage) in markdown."
                },
                "mainLanguage": {
                    "type": "string",
                    "description": "The primary programming language used."
                },
                "repoType": {
                    "type": "string",
                    "description": "Type of project: library, framework, application, CLI tool, API, etc."
                },
                "setupGuide": {
                    "type": "object",
                    "properties": {
                        "prerequisites": {"type": "string", "description": "System requirements, language/runtime versions needed"},
                        "installation": {"type": "string", "description": "Step-by-step install instructions (clone, deps)"},
                        "configuration": {"type": "string", "description": "Environment variables, config files to set up"},
                        "running": {"type": "string", "description": "How to start/run the project locally"},
                        "testing": {"type": "string", "description": "How to run the test suite"}
                    },
                    "required": ["prerequisites", "installation", "running"]
                }
            },
            "required": ["description", "purpose", "keyFeatures", "gettingStarted", "mainLanguage", "repoType", "setupGuide"]
        }),
    }
}

pub(super) fn module_analysis_tool() -> ToolDefinition {
    ToolDefinition {
        name: "analyze_module".to_string(),
        description: "Analyze a source code module/directory and generate documentation for it."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "moduleName": {
                    "type": "string",
                    "description": "Human-readable name for this module."
                },
                "description": {
                    "type": "string",
                    "description": "Detailed description of what this module does and its role in the project."
                },
                "keyExports": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "type": {"type": "string", "description": "function, class, constant, type, etc."},
                            "description": {"type": "string"}
                        },
                        "required": ["name", "type", "description"]
                    },
                    "description": "Key exported symbols from this module."
                },
                "internalDependencies": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Other modules within this project that this module depends on."
                },
                "publicAPI": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Public API surface: function signatures, class names, etc."
                },
                "sourceFiles": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Key source file paths in this module (e.g. 'src/auth/login.ts')"
                }
            },
            "required": ["moduleName", "description", "keyExports", "internalDependencies", "publicAPI", "sourceFiles"]
        }),
    }
}

pub(super) fn synthesis_tool() -> ToolDefinition {
    let entry_point_array = json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "path": {"type": "string"},
                "description": {"type": "string"},
                "type": {"type": "string"}
            },
            "required": ["name", "path", "description"]
        }
    });

    ToolDefinition {
        name: "synthesize_documentation".to_string(),
        description: "Synthesize cross-cutting documentation: architecture, tech stack, entry \
                      points, and dependencies."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "architecture": {
                    "type": "object",
                    "properties": {
                        "description": {"type": "string", "description": "High-level architecture overview in markdown."},
                        "components": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "name": {"type": "string"},
                                    "description": {"type": "string"},
                                    "path": {"type": "string"},
                                    "dependsOn": {"type": "array", "items": {"type": "string"}}
                                },
                                "required": ["name", "description", "path"]
                            }
                        },
                        "dataFlow": {"type": "string", "description": "Description of how data flows through the system."},
                        "diagrams": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "title": {"type": "string"},
                                    "type": {"type": "string", "description": "mermaid diagram type: flowchart, sequenceDiagram, classDiagram, etc."},
                                    "content": {"type": "string", "description": "Valid Mermaid diagram code."}
                                },
                                "required": ["title", "type", "content"]
                            }
                        }
                    },
                    "required": ["description", "components", "dataFlow"]
                },
                "techStack": {
                    "type": "object",
                    "properties": {
                        "languages": {"type": "array", "items": {"type": "string"}},
                        "frameworks": {"type": "array", "items": {"type": "string"}},
                        "databases": {"type": "array", "items": {"type": "string"}},
                        "tools": {"type": "array", "items": {"type": "string"}},
                        "infrastructure": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["languages", "frameworks"]
                },
                "entryPoints": {
                    "type": "object",
                    "properties": {
                        "main": entry_point_array,
                        "cli": entry_point_array,
                        "api": entry_point_array,
                        "config": entry_point_array
                    },
                    "required": ["main"]
                },
                "dependencies": {
                    "type": "object",
                    "properties": {
                        "runtime": {"type": "array", "items": {"type": "string"}},
                        "dev": {"type": "array", "items": {"type": "string"}},
                        "key": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "name": {"type": "string"},
                                    "purpose": {"type": "string"}
                                },
                                "required": ["name", "purpose"]
                            }
                        }
                    },
                    "required": ["runtime", "key"]
                }
            },
            "required": ["architecture", "techStack", "entryPoints", "dependencies"]
        }),
    }
}
