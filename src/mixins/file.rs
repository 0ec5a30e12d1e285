use std::fs;
use std::path::Path;

use crate::case::{Assertions, Context, Tolerance, Verdict, compile};
use crate::error::{Error, UsageError};

fn size_of(path: &Path,) -> Result<u64, UsageError,> {
    fs::metadata(path,)
        .map(|metadata| metadata.len(),)
        .map_err(|source| UsageError::File { path: path.to_path_buf(), source, },)
}

fn name_of(path: &Path,) -> String {
    path.file_name().map(|name| name.to_string_lossy().into_owned(),).unwrap_or_default()
}

fn extension_of(path: &Path,) -> String {
    path.extension().map(|extension| extension.to_string_lossy().into_owned(),).unwrap_or_default()
}

/// Properties of files on disk. Paths that cannot be read are usage errors,
/// not failures.
pub trait FileMixins: Assertions {
    #[track_caller]
    fn assert_file_exists(&self, path: impl AsRef<Path,>, ctx: Context<'_,>,) -> Result<(), Error,> {
        let path = path.as_ref();
        self.assert_that("assert_file_exists", ctx, || {
            Ok(Verdict::check(path.exists(), || format!("{} does not exist", path.display()),),)
        },)
    }

    #[track_caller]
    fn assert_file_not_exists(&self, path: impl AsRef<Path,>, ctx: Context<'_,>,) -> Result<(), Error,> {
        let path = path.as_ref();
        self.assert_that("assert_file_not_exists", ctx, || {
            Ok(Verdict::check(!path.exists(), || format!("{} exists", path.display()),),)
        },)
    }

    #[track_caller]
    fn assert_file_name_equal(&self, path: impl AsRef<Path,>, name: &str, ctx: Context<'_,>,) -> Result<(), Error,> {
        let actual = name_of(path.as_ref(),);
        self.assert_that("assert_file_name_equal", ctx, || {
            Ok(Verdict::check(actual == name, || format!("{actual:?} != {name:?}"),),)
        },)
    }

    #[track_caller]
    fn assert_file_name_not_equal(&self, path: impl AsRef<Path,>, name: &str, ctx: Context<'_,>,) -> Result<(), Error,> {
        let actual = name_of(path.as_ref(),);
        self.assert_that("assert_file_name_not_equal", ctx, || {
            Ok(Verdict::check(actual != name, || format!("{actual:?} == {name:?}"),),)
        },)
    }

    #[track_caller]
    fn assert_file_name_regex(&self, path: impl AsRef<Path,>, pattern: &str, ctx: Context<'_,>,) -> Result<(), Error,> {
        let actual = name_of(path.as_ref(),);
        self.assert_that("assert_file_name_regex", ctx, || {
            let regex = compile(pattern,)?;
            Ok(Verdict::check(regex.is_match(&actual,), || {
                format!("Regex didn't match: {pattern:?} not found in {actual:?}")
            },),)
        },)
    }

    #[track_caller]
    fn assert_file_name_not_regex(&self, path: impl AsRef<Path,>, pattern: &str, ctx: Context<'_,>,) -> Result<(), Error,> {
        let actual = name_of(path.as_ref(),);
        self.assert_that("assert_file_name_not_regex", ctx, || {
            let regex = compile(pattern,)?;
            Ok(match regex.find(&actual,) {
                None => Verdict::Pass,
                Some(found,) => Verdict::Fail(format!(
                    "Regex matched: {:?} matches {pattern:?} in {actual:?}",
                    found.as_str()
                ),),
            },)
        },)
    }

    /// Compares the extension, without its dot.
    #[track_caller]
    fn assert_file_type_equal(&self, path: impl AsRef<Path,>, extension: &str, ctx: Context<'_,>,) -> Result<(), Error,> {
        let actual = extension_of(path.as_ref(),);
        self.assert_that("assert_file_type_equal", ctx, || {
            Ok(Verdict::check(actual == extension, || format!("{actual:?} != {extension:?}"),),)
        },)
    }

    #[track_caller]
    fn assert_file_type_not_equal(&self, path: impl AsRef<Path,>, extension: &str, ctx: Context<'_,>,) -> Result<(), Error,> {
        let actual = extension_of(path.as_ref(),);
        self.assert_that("assert_file_type_not_equal", ctx, || {
            Ok(Verdict::check(actual != extension, || format!("{actual:?} == {extension:?}"),),)
        },)
    }

    #[track_caller]
    fn assert_file_size_equal(&self, path: impl AsRef<Path,>, size: u64, ctx: Context<'_,>,) -> Result<(), Error,> {
        let path = path.as_ref();
        self.assert_that("assert_file_size_equal", ctx, || {
            let actual = size_of(path,)?;
            Ok(Verdict::check(actual == size, || format!("{actual} != {size}"),),)
        },)
    }

    #[track_caller]
    fn assert_file_size_not_equal(&self, path: impl AsRef<Path,>, size: u64, ctx: Context<'_,>,) -> Result<(), Error,> {
        let path = path.as_ref();
        self.assert_that("assert_file_size_not_equal", ctx, || {
            let actual = size_of(path,)?;
            Ok(Verdict::check(actual != size, || format!("{actual} == {size}"),),)
        },)
    }

    #[track_caller]
    fn assert_file_size_almost_equal(
        &self,
        path: impl AsRef<Path,>,
        size: u64,
        tolerance: Tolerance,
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        let path = path.as_ref();
        self.assert_that("assert_file_size_almost_equal", ctx, || {
            let actual = size_of(path,)?;
            Ok(Verdict::check(tolerance.holds(actual as f64, size as f64,), || {
                format!("{actual} != {size} within {tolerance}")
            },),)
        },)
    }

    #[track_caller]
    fn assert_file_size_not_almost_equal(
        &self,
        path: impl AsRef<Path,>,
        size: u64,
        tolerance: Tolerance,
        ctx: Context<'_,>,
    ) -> Result<(), Error,> {
        let path = path.as_ref();
        self.assert_that("assert_file_size_not_almost_equal", ctx, || {
            let actual = size_of(path,)?;
            Ok(Verdict::check(!tolerance.holds(actual as f64, size as f64,), || {
                format!("{actual} == {size} within {tolerance}")
            },),)
        },)
    }

    #[track_caller]
    fn assert_file_size_greater(&self, path: impl AsRef<Path,>, size: u64, ctx: Context<'_,>,) -> Result<(), Error,> {
        let path = path.as_ref();
        self.assert_that("assert_file_size_greater", ctx, || {
            let actual = size_of(path,)?;
            Ok(Verdict::check(actual > size, || format!("{actual} not greater than {size}"),),)
        },)
    }

    #[track_caller]
    fn assert_file_size_greater_equal(&self, path: impl AsRef<Path,>, size: u64, ctx: Context<'_,>,) -> Result<(), Error,> {
        let path = path.as_ref();
        self.assert_that("assert_file_size_greater_equal", ctx, || {
            let actual = size_of(path,)?;
            Ok(Verdict::check(actual >= size, || format!("{actual} not greater than or equal to {size}"),),)
        },)
    }

    #[track_caller]
    fn assert_file_size_less(&self, path: impl AsRef<Path,>, size: u64, ctx: Context<'_,>,) -> Result<(), Error,> {
        let path = path.as_ref();
        self.assert_that("assert_file_size_less", ctx, || {
            let actual = size_of(path,)?;
            Ok(Verdict::check(actual < size, || format!("{actual} not less than {size}"),),)
        },)
    }

    #[track_caller]
    fn assert_file_size_less_equal(&self, path: impl AsRef<Path,>, size: u64, ctx: Context<'_,>,) -> Result<(), Error,> {
        let path = path.as_ref();
        self.assert_that("assert_file_size_less_equal", ctx, || {
            let actual = size_of(path,)?;
            Ok(Verdict::check(actual <= size, || format!("{actual} not less than or equal to {size}"),),)
        },)
    }
}

impl<A: Assertions + ?Sized,> FileMixins for A {}
