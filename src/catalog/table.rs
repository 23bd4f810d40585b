// ABOUTME: The static metric table: canonical keys, units and per-provider wire mappings
// ABOUTME: Endpoint template constants shared with the provider adapters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use super::{HealthMetric, ProviderMetricMapping};
use crate::models::{MetricGroup, Provider};

const fn m(
    provider: Provider,
    wire_id: &'static str,
    scope: Option<&'static str>,
    endpoint_template: Option<&'static str>,
) -> ProviderMetricMapping {
    ProviderMetricMapping {
        provider,
        wire_id,
        scope,
        endpoint_template,
    }
}

// Fitbit daily endpoints ({date} substituted per calendar day).
pub const FITBIT_EP_ACTIVITY: &str = "/user/-/activities/date/{date}.json";
pub const FITBIT_EP_HEART: &str = "/user/-/activities/heart/date/{date}/1d.json";
pub const FITBIT_EP_HRV: &str = "/user/-/hrv/date/{date}.json";
pub const FITBIT_EP_SPO2: &str = "/user/-/spo2/date/{date}.json";
pub const FITBIT_EP_BREATHING: &str = "/user/-/br/date/{date}.json";
pub const FITBIT_EP_SKIN_TEMP: &str = "/user/-/temp/skin/date/{date}.json";
pub const FITBIT_EP_WEIGHT: &str = "/user/-/body/log/weight/date/{date}.json";
pub const FITBIT_EP_FAT: &str = "/user/-/body/log/fat/date/{date}.json";
pub const FITBIT_EP_SLEEP: &str = "/user/-/sleep/date/{date}.json";
pub const FITBIT_EP_WATER: &str = "/user/-/foods/log/water/date/{date}.json";
pub const FITBIT_EP_CARDIO_SCORE: &str = "/user/-/cardioscore/date/{date}.json";

// Google Fit aggregates everything through one endpoint.
pub const GOOGLE_FIT_EP_AGGREGATE: &str = "/users/me/dataset:aggregate";

// Garmin wellness REST endpoints (epoch-second range parameters).
pub const GARMIN_EP_DAILIES: &str = "/dailies";
pub const GARMIN_EP_SLEEPS: &str = "/sleeps";
pub const GARMIN_EP_BODY_COMPS: &str = "/bodyComps";
pub const GARMIN_EP_HRV: &str = "/hrv";
pub const GARMIN_EP_RESPIRATION: &str = "/respiration";
pub const GARMIN_EP_PULSE_OX: &str = "/pulseOx";
pub const GARMIN_EP_USER_METRICS: &str = "/userMetrics";

// Oura v2 user collections (date range parameters).
pub const OURA_EP_DAILY_ACTIVITY: &str = "/usercollection/daily_activity";
pub const OURA_EP_SLEEP: &str = "/usercollection/sleep";
pub const OURA_EP_DAILY_SLEEP: &str = "/usercollection/daily_sleep";
pub const OURA_EP_DAILY_READINESS: &str = "/usercollection/daily_readiness";
pub const OURA_EP_HEART_RATE: &str = "/usercollection/heartrate";
pub const OURA_EP_DAILY_SPO2: &str = "/usercollection/daily_spo2";

// Polar AccessLink.
pub const POLAR_EP_SLEEP: &str = "/users/sleep";
pub const POLAR_EP_NIGHTLY_RECOVERY: &str = "/users/nightly-recovery";
pub const POLAR_EP_CONTINUOUS_HR: &str = "/users/continuous-heart-rate/{date}";
pub const POLAR_EP_PHYSICAL_INFO: &str = "/users/{userId}/physical-information";

// Withings action-style endpoints.
pub const WITHINGS_EP_MEASURE: &str = "/measure?action=getmeas";
pub const WITHINGS_EP_ACTIVITY: &str = "/v2/measure?action=getactivity";
pub const WITHINGS_EP_SLEEP_SUMMARY: &str = "/v2/sleep?action=getsummary";

// WHOOP developer API collections.
pub const WHOOP_EP_RECOVERY: &str = "/recovery";
pub const WHOOP_EP_CYCLE: &str = "/cycle";
pub const WHOOP_EP_SLEEP: &str = "/activity/sleep";

// Google Fit OAuth scopes.
const GF_ACTIVITY: &str = "https://www.googleapis.com/auth/fitness.activity.read";
const GF_HEART: &str = "https://www.googleapis.com/auth/fitness.heart_rate.read";
const GF_BODY: &str = "https://www.googleapis.com/auth/fitness.body.read";
const GF_BP: &str = "https://www.googleapis.com/auth/fitness.blood_pressure.read";
const GF_GLUCOSE: &str = "https://www.googleapis.com/auth/fitness.blood_glucose.read";
const GF_SLEEP: &str = "https://www.googleapis.com/auth/fitness.sleep.read";
const GF_NUTRITION: &str = "https://www.googleapis.com/auth/fitness.nutrition.read";
const GF_OXYGEN: &str = "https://www.googleapis.com/auth/fitness.oxygen_saturation.read";

/// The full metric table. Order within a group is presentation order.
pub static METRICS: &[HealthMetric] = &[
    // ── Activity ────────────────────────────────────────────────────────
    HealthMetric {
        key: "steps",
        display_name: "Steps",
        group: MetricGroup::Activity,
        unit: Some("count"),
        mappings: &[
            m(Provider::Fitbit, "summary.steps", Some("activity"), Some(FITBIT_EP_ACTIVITY)),
            m(Provider::GoogleFit, "com.google.step_count.delta", Some(GF_ACTIVITY), Some(GOOGLE_FIT_EP_AGGREGATE)),
            m(Provider::Garmin, "steps", None, Some(GARMIN_EP_DAILIES)),
            m(Provider::Oura, "steps", Some("daily"), Some(OURA_EP_DAILY_ACTIVITY)),
            m(Provider::Withings, "steps", Some("user.activity"), Some(WITHINGS_EP_ACTIVITY)),
            m(Provider::HealthConnect, "StepsRecord", Some("android.permission.health.READ_STEPS"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierStepCount", None, None),
        ],
    },
    HealthMetric {
        key: "distance",
        display_name: "Distance",
        group: MetricGroup::Activity,
        unit: Some("m"),
        mappings: &[
            m(Provider::Fitbit, "summary.distances", Some("activity"), Some(FITBIT_EP_ACTIVITY)),
            m(Provider::GoogleFit, "com.google.distance.delta", Some(GF_ACTIVITY), Some(GOOGLE_FIT_EP_AGGREGATE)),
            m(Provider::Garmin, "distanceInMeters", None, Some(GARMIN_EP_DAILIES)),
            m(Provider::Oura, "equivalent_walking_distance", Some("daily"), Some(OURA_EP_DAILY_ACTIVITY)),
            m(Provider::Withings, "distance", Some("user.activity"), Some(WITHINGS_EP_ACTIVITY)),
            m(Provider::HealthConnect, "DistanceRecord", Some("android.permission.health.READ_DISTANCE"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierDistanceWalkingRunning", None, None),
        ],
    },
    HealthMetric {
        key: "calories_active",
        display_name: "Active Calories",
        group: MetricGroup::Activity,
        unit: Some("kcal"),
        mappings: &[
            m(Provider::Fitbit, "summary.activityCalories", Some("activity"), Some(FITBIT_EP_ACTIVITY)),
            m(Provider::Garmin, "activeKilocalories", None, Some(GARMIN_EP_DAILIES)),
            m(Provider::Oura, "active_calories", Some("daily"), Some(OURA_EP_DAILY_ACTIVITY)),
            m(Provider::Withings, "calories", Some("user.activity"), Some(WITHINGS_EP_ACTIVITY)),
            m(Provider::Whoop, "score.kilojoule", Some("read:cycles"), Some(WHOOP_EP_CYCLE)),
            m(Provider::HealthConnect, "ActiveCaloriesBurnedRecord", Some("android.permission.health.READ_ACTIVE_CALORIES_BURNED"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierActiveEnergyBurned", None, None),
        ],
    },
    HealthMetric {
        key: "calories_total",
        display_name: "Total Calories",
        group: MetricGroup::Activity,
        unit: Some("kcal"),
        mappings: &[
            m(Provider::Fitbit, "summary.caloriesOut", Some("activity"), Some(FITBIT_EP_ACTIVITY)),
            m(Provider::GoogleFit, "com.google.calories.expended", Some(GF_ACTIVITY), Some(GOOGLE_FIT_EP_AGGREGATE)),
            m(Provider::Garmin, "totalKilocalories", None, Some(GARMIN_EP_DAILIES)),
            m(Provider::Oura, "total_calories", Some("daily"), Some(OURA_EP_DAILY_ACTIVITY)),
            m(Provider::HealthConnect, "TotalCaloriesBurnedRecord", Some("android.permission.health.READ_TOTAL_CALORIES_BURNED"), None),
        ],
    },
    HealthMetric {
        key: "floors_climbed",
        display_name: "Floors Climbed",
        group: MetricGroup::Activity,
        unit: Some("floors"),
        mappings: &[
            m(Provider::Fitbit, "summary.floors", Some("activity"), Some(FITBIT_EP_ACTIVITY)),
            m(Provider::Garmin, "floorsAscended", None, Some(GARMIN_EP_DAILIES)),
            m(Provider::HealthConnect, "FloorsClimbedRecord", Some("android.permission.health.READ_FLOORS_CLIMBED"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierFlightsClimbed", None, None),
        ],
    },
    HealthMetric {
        key: "active_minutes",
        display_name: "Active Minutes",
        group: MetricGroup::Activity,
        unit: Some("min"),
        mappings: &[
            m(Provider::Fitbit, "summary.activeMinutes", Some("activity"), Some(FITBIT_EP_ACTIVITY)),
            m(Provider::GoogleFit, "com.google.active_minutes", Some(GF_ACTIVITY), Some(GOOGLE_FIT_EP_AGGREGATE)),
            m(Provider::Garmin, "activeTimeInSeconds", None, Some(GARMIN_EP_DAILIES)),
            m(Provider::Oura, "active_minutes", Some("daily"), Some(OURA_EP_DAILY_ACTIVITY)),
            m(Provider::HealthConnect, "ExerciseSessionRecord", Some("android.permission.health.READ_EXERCISE"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierAppleExerciseTime", None, None),
        ],
    },
    // ── Heart ───────────────────────────────────────────────────────────
    HealthMetric {
        key: "heart_rate",
        display_name: "Heart Rate",
        group: MetricGroup::Heart,
        unit: Some("bpm"),
        mappings: &[
            m(Provider::Fitbit, "activities-heart", Some("heartrate"), Some(FITBIT_EP_HEART)),
            m(Provider::GoogleFit, "com.google.heart_rate.bpm", Some(GF_HEART), Some(GOOGLE_FIT_EP_AGGREGATE)),
            m(Provider::Garmin, "averageHeartRateInBeatsPerMinute", None, Some(GARMIN_EP_DAILIES)),
            m(Provider::Oura, "bpm", Some("heartrate"), Some(OURA_EP_HEART_RATE)),
            m(Provider::Polar, "heart_rate_samples", Some("accesslink.read_all"), Some(POLAR_EP_CONTINUOUS_HR)),
            m(Provider::Withings, "11", Some("user.metrics"), Some(WITHINGS_EP_MEASURE)),
            m(Provider::Whoop, "score.average_heart_rate", Some("read:cycles"), Some(WHOOP_EP_CYCLE)),
            m(Provider::HealthConnect, "HeartRateRecord", Some("android.permission.health.READ_HEART_RATE"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierHeartRate", None, None),
        ],
    },
    HealthMetric {
        key: "resting_heart_rate",
        display_name: "Resting Heart Rate",
        group: MetricGroup::Heart,
        unit: Some("bpm"),
        mappings: &[
            m(Provider::Fitbit, "activities-heart.restingHeartRate", Some("heartrate"), Some(FITBIT_EP_HEART)),
            m(Provider::Garmin, "restingHeartRateInBeatsPerMinute", None, Some(GARMIN_EP_DAILIES)),
            m(Provider::Polar, "heart_rate_avg", Some("accesslink.read_all"), Some(POLAR_EP_NIGHTLY_RECOVERY)),
            m(Provider::Whoop, "score.resting_heart_rate", Some("read:recovery"), Some(WHOOP_EP_RECOVERY)),
            m(Provider::HealthConnect, "RestingHeartRateRecord", Some("android.permission.health.READ_RESTING_HEART_RATE"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierRestingHeartRate", None, None),
        ],
    },
    HealthMetric {
        key: "heart_rate_variability",
        display_name: "Heart Rate Variability",
        group: MetricGroup::Heart,
        unit: Some("ms"),
        mappings: &[
            m(Provider::Fitbit, "hrv.dailyRmssd", Some("heartrate"), Some(FITBIT_EP_HRV)),
            m(Provider::Garmin, "lastNightAvg", None, Some(GARMIN_EP_HRV)),
            m(Provider::Oura, "average_hrv", Some("daily"), Some(OURA_EP_SLEEP)),
            m(Provider::Polar, "heart_rate_variability_avg", Some("accesslink.read_all"), Some(POLAR_EP_NIGHTLY_RECOVERY)),
            m(Provider::Whoop, "score.hrv_rmssd_milli", Some("read:recovery"), Some(WHOOP_EP_RECOVERY)),
            m(Provider::HealthConnect, "HeartRateVariabilityRmssdRecord", Some("android.permission.health.READ_HEART_RATE_VARIABILITY"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierHeartRateVariabilitySDNN", None, None),
        ],
    },
    HealthMetric {
        key: "blood_pressure_systolic",
        display_name: "Blood Pressure (Systolic)",
        group: MetricGroup::Heart,
        unit: Some("mmHg"),
        mappings: &[
            m(Provider::GoogleFit, "com.google.blood_pressure", Some(GF_BP), Some(GOOGLE_FIT_EP_AGGREGATE)),
            m(Provider::Withings, "10", Some("user.metrics"), Some(WITHINGS_EP_MEASURE)),
            m(Provider::HealthConnect, "BloodPressureRecord", Some("android.permission.health.READ_BLOOD_PRESSURE"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierBloodPressureSystolic", None, None),
        ],
    },
    HealthMetric {
        key: "blood_pressure_diastolic",
        display_name: "Blood Pressure (Diastolic)",
        group: MetricGroup::Heart,
        unit: Some("mmHg"),
        mappings: &[
            m(Provider::GoogleFit, "com.google.blood_pressure", Some(GF_BP), Some(GOOGLE_FIT_EP_AGGREGATE)),
            m(Provider::Withings, "9", Some("user.metrics"), Some(WITHINGS_EP_MEASURE)),
            m(Provider::HealthConnect, "BloodPressureRecord", Some("android.permission.health.READ_BLOOD_PRESSURE"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierBloodPressureDiastolic", None, None),
        ],
    },
    HealthMetric {
        key: "vo2_max",
        display_name: "VO2 Max",
        group: MetricGroup::Heart,
        unit: Some("mL/kg/min"),
        mappings: &[
            m(Provider::Fitbit, "cardioScore.vo2Max", Some("cardio_fitness"), Some(FITBIT_EP_CARDIO_SCORE)),
            m(Provider::Garmin, "vo2Max", None, Some(GARMIN_EP_USER_METRICS)),
            m(Provider::Polar, "vo2-max", Some("accesslink.read_all"), Some(POLAR_EP_PHYSICAL_INFO)),
            m(Provider::HealthConnect, "Vo2MaxRecord", Some("android.permission.health.READ_VO2_MAX"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierVO2Max", None, None),
        ],
    },
    // ── Respiratory ─────────────────────────────────────────────────────
    HealthMetric {
        key: "blood_oxygen",
        display_name: "Blood Oxygen Saturation",
        group: MetricGroup::Respiratory,
        unit: Some("%"),
        mappings: &[
            m(Provider::Fitbit, "spo2.avg", Some("oxygen_saturation"), Some(FITBIT_EP_SPO2)),
            m(Provider::GoogleFit, "com.google.oxygen_saturation", Some(GF_OXYGEN), Some(GOOGLE_FIT_EP_AGGREGATE)),
            m(Provider::Garmin, "averageSpo2", None, Some(GARMIN_EP_PULSE_OX)),
            m(Provider::Oura, "spo2_percentage.average", Some("daily"), Some(OURA_EP_DAILY_SPO2)),
            m(Provider::Withings, "54", Some("user.metrics"), Some(WITHINGS_EP_MEASURE)),
            m(Provider::Whoop, "score.spo2_percentage", Some("read:recovery"), Some(WHOOP_EP_RECOVERY)),
            m(Provider::HealthConnect, "OxygenSaturationRecord", Some("android.permission.health.READ_OXYGEN_SATURATION"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierOxygenSaturation", None, None),
        ],
    },
    HealthMetric {
        key: "respiratory_rate",
        display_name: "Respiratory Rate",
        group: MetricGroup::Respiratory,
        unit: Some("breaths/min"),
        mappings: &[
            m(Provider::Fitbit, "br.breathingRate", Some("respiratory_rate"), Some(FITBIT_EP_BREATHING)),
            m(Provider::Garmin, "avgSleepRespirationValue", None, Some(GARMIN_EP_RESPIRATION)),
            m(Provider::Oura, "average_breath", Some("daily"), Some(OURA_EP_SLEEP)),
            m(Provider::Whoop, "score.respiratory_rate", Some("read:sleep"), Some(WHOOP_EP_SLEEP)),
            m(Provider::HealthConnect, "RespiratoryRateRecord", Some("android.permission.health.READ_RESPIRATORY_RATE"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierRespiratoryRate", None, None),
        ],
    },
    // ── Body ────────────────────────────────────────────────────────────
    HealthMetric {
        key: "body_temperature",
        display_name: "Body Temperature",
        group: MetricGroup::Body,
        unit: Some("°C"),
        mappings: &[
            m(Provider::Fitbit, "tempSkin.nightlyRelative", Some("temperature"), Some(FITBIT_EP_SKIN_TEMP)),
            m(Provider::Withings, "71", Some("user.metrics"), Some(WITHINGS_EP_MEASURE)),
            m(Provider::HealthConnect, "BodyTemperatureRecord", Some("android.permission.health.READ_BODY_TEMPERATURE"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierBodyTemperature", None, None),
        ],
    },
    HealthMetric {
        key: "weight",
        display_name: "Weight",
        group: MetricGroup::Body,
        unit: Some("kg"),
        mappings: &[
            m(Provider::Fitbit, "weight", Some("weight"), Some(FITBIT_EP_WEIGHT)),
            m(Provider::GoogleFit, "com.google.weight", Some(GF_BODY), Some(GOOGLE_FIT_EP_AGGREGATE)),
            m(Provider::Garmin, "weightInGrams", None, Some(GARMIN_EP_BODY_COMPS)),
            m(Provider::Polar, "weight", Some("accesslink.read_all"), Some(POLAR_EP_PHYSICAL_INFO)),
            m(Provider::Withings, "1", Some("user.metrics"), Some(WITHINGS_EP_MEASURE)),
            m(Provider::HealthConnect, "WeightRecord", Some("android.permission.health.READ_WEIGHT"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierBodyMass", None, None),
        ],
    },
    HealthMetric {
        key: "body_fat",
        display_name: "Body Fat",
        group: MetricGroup::Body,
        unit: Some("%"),
        mappings: &[
            m(Provider::Fitbit, "fat", Some("weight"), Some(FITBIT_EP_FAT)),
            m(Provider::GoogleFit, "com.google.body.fat.percentage", Some(GF_BODY), Some(GOOGLE_FIT_EP_AGGREGATE)),
            m(Provider::Garmin, "bodyFatInPercent", None, Some(GARMIN_EP_BODY_COMPS)),
            m(Provider::Withings, "6", Some("user.metrics"), Some(WITHINGS_EP_MEASURE)),
            m(Provider::HealthConnect, "BodyFatRecord", Some("android.permission.health.READ_BODY_FAT"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierBodyFatPercentage", None, None),
        ],
    },
    HealthMetric {
        key: "bmi",
        display_name: "Body Mass Index",
        group: MetricGroup::Body,
        unit: Some("kg/m²"),
        mappings: &[
            m(Provider::Garmin, "bodyMassIndex", None, Some(GARMIN_EP_BODY_COMPS)),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierBodyMassIndex", None, None),
        ],
    },
    HealthMetric {
        key: "height",
        display_name: "Height",
        group: MetricGroup::Body,
        unit: Some("m"),
        mappings: &[
            m(Provider::GoogleFit, "com.google.height", Some(GF_BODY), Some(GOOGLE_FIT_EP_AGGREGATE)),
            m(Provider::Polar, "height", Some("accesslink.read_all"), Some(POLAR_EP_PHYSICAL_INFO)),
            m(Provider::Withings, "4", Some("user.metrics"), Some(WITHINGS_EP_MEASURE)),
            m(Provider::HealthConnect, "HeightRecord", Some("android.permission.health.READ_HEIGHT"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierHeight", None, None),
        ],
    },
    // ── Sleep ───────────────────────────────────────────────────────────
    HealthMetric {
        key: "sleep_duration",
        display_name: "Sleep Duration",
        group: MetricGroup::Sleep,
        unit: Some("min"),
        mappings: &[
            m(Provider::Fitbit, "sleep.minutesAsleep", Some("sleep"), Some(FITBIT_EP_SLEEP)),
            m(Provider::GoogleFit, "com.google.sleep.segment", Some(GF_SLEEP), Some(GOOGLE_FIT_EP_AGGREGATE)),
            m(Provider::Garmin, "durationInSeconds", None, Some(GARMIN_EP_SLEEPS)),
            m(Provider::Oura, "total_sleep_duration", Some("daily"), Some(OURA_EP_SLEEP)),
            m(Provider::Polar, "sleep_duration", Some("accesslink.read_all"), Some(POLAR_EP_SLEEP)),
            m(Provider::Withings, "totalsleepduration", Some("user.activity"), Some(WITHINGS_EP_SLEEP_SUMMARY)),
            m(Provider::Whoop, "score.stage_summary.total_in_bed_time_milli", Some("read:sleep"), Some(WHOOP_EP_SLEEP)),
            m(Provider::HealthConnect, "SleepSessionRecord", Some("android.permission.health.READ_SLEEP"), None),
            m(Provider::AppleHealth, "HKCategoryTypeIdentifierSleepAnalysis", None, None),
        ],
    },
    HealthMetric {
        key: "sleep_deep",
        display_name: "Deep Sleep",
        group: MetricGroup::Sleep,
        unit: Some("min"),
        mappings: &[
            m(Provider::Fitbit, "sleep.levels.deep", Some("sleep"), Some(FITBIT_EP_SLEEP)),
            m(Provider::Garmin, "deepSleepDurationInSeconds", None, Some(GARMIN_EP_SLEEPS)),
            m(Provider::Oura, "deep_sleep_duration", Some("daily"), Some(OURA_EP_SLEEP)),
            m(Provider::Polar, "deep_sleep", Some("accesslink.read_all"), Some(POLAR_EP_SLEEP)),
            m(Provider::Withings, "deepsleepduration", Some("user.activity"), Some(WITHINGS_EP_SLEEP_SUMMARY)),
            m(Provider::Whoop, "score.stage_summary.total_slow_wave_sleep_time_milli", Some("read:sleep"), Some(WHOOP_EP_SLEEP)),
        ],
    },
    HealthMetric {
        key: "sleep_rem",
        display_name: "REM Sleep",
        group: MetricGroup::Sleep,
        unit: Some("min"),
        mappings: &[
            m(Provider::Fitbit, "sleep.levels.rem", Some("sleep"), Some(FITBIT_EP_SLEEP)),
            m(Provider::Garmin, "remSleepInSeconds", None, Some(GARMIN_EP_SLEEPS)),
            m(Provider::Oura, "rem_sleep_duration", Some("daily"), Some(OURA_EP_SLEEP)),
            m(Provider::Polar, "rem_sleep", Some("accesslink.read_all"), Some(POLAR_EP_SLEEP)),
            m(Provider::Withings, "remsleepduration", Some("user.activity"), Some(WITHINGS_EP_SLEEP_SUMMARY)),
            m(Provider::Whoop, "score.stage_summary.total_rem_sleep_time_milli", Some("read:sleep"), Some(WHOOP_EP_SLEEP)),
        ],
    },
    HealthMetric {
        key: "sleep_light",
        display_name: "Light Sleep",
        group: MetricGroup::Sleep,
        unit: Some("min"),
        mappings: &[
            m(Provider::Fitbit, "sleep.levels.light", Some("sleep"), Some(FITBIT_EP_SLEEP)),
            m(Provider::Garmin, "lightSleepDurationInSeconds", None, Some(GARMIN_EP_SLEEPS)),
            m(Provider::Oura, "light_sleep_duration", Some("daily"), Some(OURA_EP_SLEEP)),
            m(Provider::Polar, "light_sleep", Some("accesslink.read_all"), Some(POLAR_EP_SLEEP)),
            m(Provider::Withings, "lightsleepduration", Some("user.activity"), Some(WITHINGS_EP_SLEEP_SUMMARY)),
            m(Provider::Whoop, "score.stage_summary.total_light_sleep_time_milli", Some("read:sleep"), Some(WHOOP_EP_SLEEP)),
        ],
    },
    HealthMetric {
        key: "sleep_score",
        display_name: "Sleep Score",
        group: MetricGroup::Sleep,
        unit: Some("score"),
        mappings: &[
            m(Provider::Garmin, "overallSleepScore", None, Some(GARMIN_EP_SLEEPS)),
            m(Provider::Oura, "score", Some("daily"), Some(OURA_EP_DAILY_SLEEP)),
            m(Provider::Whoop, "score.sleep_performance_percentage", Some("read:sleep"), Some(WHOOP_EP_SLEEP)),
        ],
    },
    // ── Metabolic ───────────────────────────────────────────────────────
    HealthMetric {
        key: "blood_glucose",
        display_name: "Blood Glucose",
        group: MetricGroup::Metabolic,
        unit: Some("mg/dL"),
        mappings: &[
            m(Provider::GoogleFit, "com.google.blood_glucose", Some(GF_GLUCOSE), Some(GOOGLE_FIT_EP_AGGREGATE)),
            m(Provider::HealthConnect, "BloodGlucoseRecord", Some("android.permission.health.READ_BLOOD_GLUCOSE"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierBloodGlucose", None, None),
        ],
    },
    // ── Nutrition ───────────────────────────────────────────────────────
    HealthMetric {
        key: "water_intake",
        display_name: "Water Intake",
        group: MetricGroup::Nutrition,
        unit: Some("mL"),
        mappings: &[
            m(Provider::Fitbit, "summary.water", Some("nutrition"), Some(FITBIT_EP_WATER)),
            m(Provider::GoogleFit, "com.google.hydration", Some(GF_NUTRITION), Some(GOOGLE_FIT_EP_AGGREGATE)),
            m(Provider::HealthConnect, "HydrationRecord", Some("android.permission.health.READ_HYDRATION"), None),
            m(Provider::AppleHealth, "HKQuantityTypeIdentifierDietaryWater", None, None),
        ],
    },
    // ── Wellness ────────────────────────────────────────────────────────
    HealthMetric {
        key: "readiness_score",
        display_name: "Readiness Score",
        group: MetricGroup::Wellness,
        unit: Some("score"),
        mappings: &[
            m(Provider::Oura, "score", Some("daily"), Some(OURA_EP_DAILY_READINESS)),
            m(Provider::Polar, "ans_charge", Some("accesslink.read_all"), Some(POLAR_EP_NIGHTLY_RECOVERY)),
            m(Provider::Whoop, "score.recovery_score", Some("read:recovery"), Some(WHOOP_EP_RECOVERY)),
        ],
    },
    HealthMetric {
        key: "mindfulness_minutes",
        display_name: "Mindfulness Minutes",
        group: MetricGroup::Wellness,
        unit: Some("min"),
        mappings: &[
            m(Provider::HealthConnect, "MindfulnessSessionRecord", Some("android.permission.health.READ_MINDFULNESS"), None),
            m(Provider::AppleHealth, "HKCategoryTypeIdentifierMindfulSession", None, None),
        ],
    },
];
