//! Key layout for job records, indexes, and queues
//!
//! ```text
//! job:{id}           serialized job record
//! jobs:index         set of all job ids
//! job:type:{t}       set of job ids of a type
//! job:status:{s}     set of job ids in a status
//! job:user:{u}       set of job ids owned by a user
//! job:queue:{t}      sorted set, score = priority (or enqueue second)
//! ```

use crate::models::{JobStatus, JobType};

/// All job ids
pub const JOBS_INDEX: &str = "jobs:index";

pub fn job(id: &str) -> String {
    format!("job:{id}")
}

pub fn by_type(job_type: JobType) -> String {
    format!("job:type:{job_type}")
}

pub fn by_status(status: JobStatus) -> String {
    format!("job:status:{status}")
}

pub fn by_user(user_id: &str) -> String {
    format!("job:user:{user_id}")
}

pub fn queue(job_type: JobType) -> String {
    format!("job:queue:{job_type}")
}
