//! 通用工具函数

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

/// 合并日期与时间为一个时间点
pub fn combine_date_time(date: NaiveDate, time: NaiveTime) -> NaiveDateTime {
    date.and_time(time)
}

/// 按公历精确计算某日的年龄（生日未到则减一）
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_date_time() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let time = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        let combined = combine_date_time(date, time);
        assert_eq!(combined.date(), date);
        assert_eq!(combined.time(), time);
    }

    #[test]
    fn test_age_on_birthday_boundary() {
        let dob = NaiveDate::from_ymd_opt(2000, 2, 29).unwrap();
        // 闰日出生，在平年 2 月 28 日尚未满岁
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()), 22);
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2023, 3, 1).unwrap()), 23);
    }
}
