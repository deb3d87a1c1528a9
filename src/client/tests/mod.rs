use super::test_helpers::*;
use super::*;
use crate::error::Error;
use crate::media::AggregatedResult;
use crate::types::{Event, ParamAssignment, StatusResult, TaskId, TaskState};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

mod lifecycle;
