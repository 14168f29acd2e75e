mod kube_access_test;
mod owners_test;

use kr_testutils::*;
use rstest::*;

use super::*;
use crate::macros::*;
