//! Contract checks shared by the test suites of apps.
//!
//! ```rust,ignore
//! trainapp::app_contract_tests!(iris_contract, IrisApp::default);
//! ```

use clap::error::ErrorKind;

use crate::app::App;
use crate::bibtex::merge_bibtex_files;
use trainapp_core::Hook;
use trainapp_train::FitConfig;

/// Builds fresh instances of the app under test and checks the framework
/// contract on them.
#[derive(Debug, Clone, Copy)]
pub struct AppTestCase<A: App> {
    ctor: fn() -> A,
}

impl<A: App> AppTestCase<A> {
    /// Test case constructing the app with `ctor`.
    pub fn new(ctor: fn() -> A) -> Self {
        Self { ctor }
    }

    /// A fresh app instance.
    pub fn app(&self) -> A {
        (self.ctor)()
    }

    /// The hook declarations pass validation.
    pub fn assert_cli_builds(&self) {
        match self.app().cli() {
            Ok(cli) => cli.command().debug_assert(),
            Err(e) => panic!("cli() failed: {e}"),
        }
    }

    /// `--help` exits successfully and lists the commands.
    pub fn assert_help_renders(&self) {
        let app = self.app();
        let name = app.name();
        let cli = match app.cli() {
            Ok(cli) => cli,
            Err(e) => panic!("cli() failed: {e}"),
        };

        let err = match cli.command().try_get_matches_from([name.as_str(), "--help"]) {
            Ok(_) => panic!("--help parsed as a normal invocation"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);

        let help = err.render().to_string();
        assert!(help.contains("<COMMAND>"), "help has no <COMMAND>:\n{help}");
        assert!(help.contains("Options:"), "help has no Options:\n{help}");
    }

    /// Every declared default lands in `default_args`, and the fit
    /// defaults form a valid [`FitConfig`].
    pub fn assert_default_args_build(&self) {
        let app = self.app();
        for hook in Hook::ALL {
            let args = app.default_args(hook);
            for param in app.params(hook) {
                if let Some(default) = param.default_value() {
                    assert_eq!(
                        args.value(param.name()),
                        Some(default),
                        "default of '{}' in hook '{hook}'",
                        param.name()
                    );
                }
            }
        }

        if let Err(e) = FitConfig::from_args(&app.default_args(Hook::Fit)) {
            panic!("fit defaults are invalid: {e}");
        }
    }

    /// Every bibliography file exists and the merge succeeds.
    pub fn assert_bibtex_files_exist(&self) {
        let files = self.app().bibtex_files();
        for file in &files {
            assert!(file.is_file(), "missing bibtex file {}", file.display());
        }
        if let Err(e) = merge_bibtex_files(&files) {
            panic!("bibtex merge failed: {e}");
        }
    }
}

/// Stamp out the contract tests of an app type.
///
/// `$ctor` is any `fn() -> A`, usually `MyApp::default`.
#[macro_export]
macro_rules! app_contract_tests {
    ($name:ident, $ctor:expr) => {
        mod $name {
            #[allow(unused_imports)]
            use super::*;

            #[test]
            fn cli_builds() {
                $crate::testing::AppTestCase::new($ctor).assert_cli_builds();
            }

            #[test]
            fn help_renders() {
                $crate::testing::AppTestCase::new($ctor).assert_help_renders();
            }

            #[test]
            fn default_args_build() {
                $crate::testing::AppTestCase::new($ctor).assert_default_args_build();
            }

            #[test]
            fn bibtex_files_exist() {
                $crate::testing::AppTestCase::new($ctor).assert_bibtex_files_exist();
            }
        }
    };
}
