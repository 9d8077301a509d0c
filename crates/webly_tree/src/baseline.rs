//! Configuration files injected into every mounted project.
//!
//! Generated trees are merged on top of the baseline before mounting: the
//! baseline provides the markup entry point, the bundler config, the styling
//! config and the lint config, and generated entries with the same name win.
//! When the generated tree has no `src` entry at all, a minimal
//! `src/main.jsx` is supplied so the dev server has something to serve.

use crate::models::{FileTree, TreeNode};

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <link rel="icon" type="image/svg+xml" href="/vite.svg" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>Vite + React</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.jsx"></script>
  </body>
</html>
"#;

pub const VITE_CONFIG: &str = r#"import { defineConfig } from 'vite';
import react from '@vitejs/plugin-react';
import path from 'path';

export default defineConfig({
  plugins: [react()],
  server: {
    headers: {
      'Cross-Origin-Opener-Policy': 'same-origin',
      'Cross-Origin-Embedder-Policy': 'require-corp',
    },
  },
  build: {
    assetsInlineLimit: 0,
  },
  resolve: {
    alias: {
      components: path.resolve(__dirname, './src/components'),
      pages: path.resolve(__dirname, './src/pages'),
    },
  },
});
"#;

pub const TAILWIND_CONFIG: &str = r#"/** @type {import('tailwindcss').Config} */
export default {
  content: ['./index.html', './src/**/*.{js,ts,jsx,tsx}'],
  theme: {
    extend: {},
  },
  plugins: [],
};
"#;

pub const POSTCSS_CONFIG: &str = r#"module.exports = {
  plugins: {
    tailwindcss: {},
    autoprefixer: {},
  },
};
"#;

pub const LEGACY_ESLINT_CONFIG: &str = r#"module.exports = {
  extends: ["eslint:recommended", "plugin:import/errors", "plugin:import/warnings"],
  plugins: ["import"],
  rules: {
    "import/no-unresolved": "error",
    "import/no-extraneous-dependencies": "error"
  },
  settings: {
    "import/resolver": {
      node: {
        extensions: [".js", ".jsx", ".ts", ".tsx"],
        moduleDirectory: ["node_modules", "src"]
      }
    }
  }
};
"#;

pub const ESLINT_CONFIG: &str = r#"import js from '@eslint/js'
import globals from 'globals'
import react from 'eslint-plugin-react'
import reactHooks from 'eslint-plugin-react-hooks'
import reactRefresh from 'eslint-plugin-react-refresh'

export default [
  { ignores: ['dist'] },
  {
    files: ['**/*.{js,jsx}'],
    languageOptions: {
      ecmaVersion: 2020,
      globals: globals.browser,
      parserOptions: {
        ecmaVersion: 'latest',
        ecmaFeatures: { jsx: true },
        sourceType: 'module',
      },
    },
    settings: { react: { version: '18.3' } },
    plugins: {
      react,
      'react-hooks': reactHooks,
      'react-refresh': reactRefresh,
    },
    rules: {
      ...js.configs.recommended.rules,
      ...react.configs.recommended.rules,
      ...react.configs['jsx-runtime'].rules,
      ...reactHooks.configs.recommended.rules,
      'react/jsx-no-target-blank': 'off',
      'react-refresh/only-export-components': [
        'warn',
        { allowConstantExport: true },
      ],
    },
  },
]
"#;

pub const FALLBACK_MAIN: &str = r#"import React from 'react';
import ReactDOM from 'react-dom';

function App() {
  return <h1>Hello, World!</h1>;
}

ReactDOM.render(<App />, document.getElementById('root'));
"#;

/// Names of the injected top-level files.
pub const INJECTED_FILES: &[&str] = &[
    "index.html",
    "vite.config.js",
    "tailwind.config.js",
    "postcss.config.cjs",
    "eslintrc.js",
    "eslint.config.js",
];

/// The injected configuration set.
#[derive(Debug, Clone)]
pub struct Baseline {
    files: FileTree,
    fallback_src: FileTree,
}

impl Default for Baseline {
    fn default() -> Self {
        Self::vite_react()
    }
}

impl Baseline {
    /// Vite + React + Tailwind + ESLint baseline.
    pub fn vite_react() -> Self {
        let files = FileTree::new()
            .with_file("index.html", INDEX_HTML)
            .with_file("vite.config.js", VITE_CONFIG)
            .with_file("tailwind.config.js", TAILWIND_CONFIG)
            .with_file("postcss.config.cjs", POSTCSS_CONFIG)
            .with_file("eslintrc.js", LEGACY_ESLINT_CONFIG)
            .with_file("eslint.config.js", ESLINT_CONFIG);
        let fallback_src = FileTree::new().with_file("main.jsx", FALLBACK_MAIN);
        Self {
            files,
            fallback_src,
        }
    }

    /// Build a custom baseline.
    pub fn new(files: FileTree, fallback_src: FileTree) -> Self {
        Self {
            files,
            fallback_src,
        }
    }

    pub fn files(&self) -> &FileTree {
        &self.files
    }

    /// Merge a generated tree on top of the baseline.
    ///
    /// Merging an already merged tree yields the same tree.
    pub fn merge(&self, generated: &FileTree) -> FileTree {
        let mut merged = self.files.clone();
        for (name, node) in generated.entries() {
            merged.set_entry(name.clone(), node.clone());
        }
        if generated.entry("src").is_none() {
            merged.set_entry("src", TreeNode::Directory(self.fallback_src.clone()));
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_injects_every_config_file() {
        let generated = FileTree::new().with_file("src/main.jsx", "import App from './App';");
        let merged = Baseline::default().merge(&generated);

        for name in INJECTED_FILES {
            assert!(merged.contains(name), "missing {}", name);
        }
        assert_eq!(
            merged.file_contents("src/main.jsx"),
            Some("import App from './App';")
        );
        assert!(!merged.contains("src/App.jsx"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let baseline = Baseline::default();
        let trees = vec![
            FileTree::new(),
            FileTree::new().with_file("package.json", "{}"),
            FileTree::new()
                .with_file("index.html", "<custom/>")
                .with_file("src/App.jsx", "app")
                .with_file("src/main.jsx", "main"),
        ];

        for tree in trees {
            let once = baseline.merge(&tree);
            let twice = baseline.merge(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_generated_entries_override_baseline() {
        let generated = FileTree::new().with_file("index.html", "<custom/>");
        let merged = Baseline::default().merge(&generated);
        assert_eq!(merged.file_contents("index.html"), Some("<custom/>"));
    }

    #[test]
    fn test_fallback_src_only_when_missing() {
        let merged = Baseline::default().merge(&FileTree::new());
        assert_eq!(merged.file_contents("src/main.jsx"), Some(FALLBACK_MAIN));

        let generated = FileTree::new().with_file("src/App.jsx", "app");
        let merged = Baseline::default().merge(&generated);
        assert!(!merged.contains("src/main.jsx"));
    }
}
