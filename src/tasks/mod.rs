mod scheduler;

pub use scheduler::{
    run_job, DailySchedule, JobReport, ScheduleError, ScheduledJob, SchedulerTask,
};
