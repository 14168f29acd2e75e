mod wait_test;

use assertables::*;
use clap::Parser;
use rstest::*;

use super::*;
