//! System instruction sent ahead of every conversation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The application template a project is generated from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectType {
    React,
    #[serde(rename = "nextjs")]
    NextJs,
    #[default]
    ReactNative,
}

impl FromStr for ProjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "react" => Ok(Self::React),
            "nextjs" | "next" | "next-js" => Ok(Self::NextJs),
            "react-native" | "expo" => Ok(Self::ReactNative),
            other => Err(format!(
                "Unknown project type '{other}' (expected react, nextjs or react-native)"
            )),
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::React => "react",
            Self::NextJs => "nextjs",
            Self::ReactNative => "react-native",
        })
    }
}

impl ProjectType {
    fn stack(self) -> &'static str {
        match self {
            Self::React => {
                "a React single-page app built with Vite and TypeScript. \
                 Keep the entry point in src/main.tsx and the root component in src/App.tsx."
            }
            Self::NextJs => {
                "a Next.js app using the App Router and TypeScript. \
                 Pages live under app/, shared components under components/."
            }
            Self::ReactNative => {
                "a React Native app built with Expo and TypeScript. \
                 Screens live under app/ using expo-router; use only Expo-compatible packages."
            }
        }
    }

    /// The instruction placed ahead of the conversation as a model turn.
    pub fn system_instruction(self) -> String {
        format!(
            r#"You are Bolty, an expert software engineer. The project is {stack}

Reply with exactly one artifact describing every change:

<boltArtifact id="project" title="Short title">
<boltAction type="file" filePath="relative/path/to/file">
full file contents
</boltAction>
<boltAction type="shell">
command to run
</boltAction>
</boltArtifact>

Rules:
- Always write the complete contents of a file, never a diff or a placeholder.
- File paths are relative to the project root and never start with "/" or contain "..".
- Order actions so that files exist before any command that uses them.
- Chain dependent commands with && inside one shell action.
- Do not start long-running processes such as dev servers.
- Keep prose outside the artifact brief."#,
            stack = self.stack()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_spellings() {
        assert_eq!("react".parse::<ProjectType>().unwrap(), ProjectType::React);
        assert_eq!("NEXTJS".parse::<ProjectType>().unwrap(), ProjectType::NextJs);
        assert_eq!(
            "REACT_NATIVE".parse::<ProjectType>().unwrap(),
            ProjectType::ReactNative
        );
        assert!("angular".parse::<ProjectType>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for t in [ProjectType::React, ProjectType::NextJs, ProjectType::ReactNative] {
            assert_eq!(t.to_string().parse::<ProjectType>().unwrap(), t);
        }
    }

    #[test]
    fn default_is_react_native() {
        assert_eq!(ProjectType::default(), ProjectType::ReactNative);
    }

    #[test]
    fn instruction_names_stack_and_markup() {
        let text = ProjectType::NextJs.system_instruction();
        assert!(text.contains("Next.js"));
        assert!(text.contains(r#"<boltAction type="file" filePath="#));
        assert!(text.contains("</boltAction>"));
    }
}
