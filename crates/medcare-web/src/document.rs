//! 处方文档导出
//!
//! 文档内容先组装成与版式无关的结构，再交给渲染器输出字节流。内置
//! 纯文本渲染器；PDF等富格式属于外部协作方，接入时实现同一trait即可。

use std::fmt::Write as _;

use chrono::NaiveDate;
use medcare_core::{Medicine, Patient, Practitioner, Prescription, Result};

/// 处方文档的版式无关内容
#[derive(Debug, Clone)]
pub struct PrescriptionDocument {
    pub clinic_name: String,
    pub prescription_id: String,
    pub issued_on: NaiveDate,
    pub practitioner_name: String,
    pub specialty: String,
    pub patient_name: String,
    pub patient_last_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub medicines: Vec<MedicineLine>,
    pub notes: Option<String>,
}

/// 药品条目行
#[derive(Debug, Clone)]
pub struct MedicineLine {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
}

impl PrescriptionDocument {
    /// 汇集处方、患者与医生信息
    pub fn assemble(
        prescription: &Prescription,
        medicines: &[Medicine],
        patient: &Patient,
        practitioner: &Practitioner,
    ) -> Self {
        Self {
            clinic_name: "MedCare Clinic".to_string(),
            prescription_id: prescription.id.to_string(),
            issued_on: prescription.prescription_date,
            practitioner_name: practitioner.display_name(),
            specialty: practitioner.specialty.as_str().to_string(),
            patient_name: patient.full_name(),
            patient_last_name: patient.last_name.clone(),
            patient_email: patient.email.clone(),
            patient_phone: patient.phone.clone(),
            medicines: medicines
                .iter()
                .map(|m| MedicineLine {
                    name: m.name.clone(),
                    dosage: m.dosage.clone(),
                    frequency: m.frequency.clone(),
                    duration: m.duration.clone(),
                })
                .collect(),
            notes: prescription.notes.clone(),
        }
    }

    /// 下载附件的推荐文件名
    pub fn suggested_filename(&self, extension: &str) -> String {
        format!(
            "prescription_{}_{}.{}",
            self.prescription_id, self.patient_last_name, extension
        )
    }
}

/// 文档渲染器接口
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, document: &PrescriptionDocument) -> Result<Vec<u8>>;
    fn content_type(&self) -> &'static str;
    fn file_extension(&self) -> &'static str;
}

/// 纯文本渲染器
#[derive(Debug, Default)]
pub struct PlainTextRenderer;

impl DocumentRenderer for PlainTextRenderer {
    fn render(&self, document: &PrescriptionDocument) -> Result<Vec<u8>> {
        let mut out = String::new();
        let rule = "=".repeat(72);
        let thin_rule = "-".repeat(72);

        // 诊所抬头
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "{:^72}", document.clinic_name);
        let _ = writeln!(out, "{:^72}", "MEDICAL PRESCRIPTION");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out);

        // 基本信息
        let _ = writeln!(
            out,
            "Prescription ID: #{:<26} Date: {}",
            document.prescription_id,
            document.issued_on.format("%B %d, %Y")
        );
        let _ = writeln!(out, "Patient:         {}", document.patient_name);
        let _ = writeln!(out, "Email:           {}", document.patient_email);
        let _ = writeln!(out, "Phone:           {}", document.patient_phone);
        let _ = writeln!(
            out,
            "Doctor:          {} ({})",
            document.practitioner_name, document.specialty
        );
        let _ = writeln!(out);

        // 药品表格
        let _ = writeln!(out, "PRESCRIBED MEDICATIONS");
        let _ = writeln!(out, "{thin_rule}");
        let _ = writeln!(
            out,
            "{:<3} {:<28} {:<13} {:<14} {:<10}",
            "#", "Medicine Name", "Dosage", "Frequency", "Duration"
        );
        let _ = writeln!(out, "{thin_rule}");
        for (index, medicine) in document.medicines.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:<3} {:<28} {:<13} {:<14} {:<10}",
                index + 1,
                medicine.name,
                medicine.dosage,
                medicine.frequency,
                medicine.duration
            );
        }
        let _ = writeln!(out, "{thin_rule}");

        // 附加说明
        if let Some(notes) = document.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            let _ = writeln!(out);
            let _ = writeln!(out, "INSTRUCTIONS & NOTES");
            let _ = writeln!(out, "{notes}");
        }

        // 签名栏与落款
        let _ = writeln!(out);
        let _ = writeln!(out);
        let _ = writeln!(out, "_________________________    _________________________");
        let _ = writeln!(out, "Doctor Signature             Date & Stamp");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "This is a computer-generated prescription. Please consult your \
             doctor before taking any medication."
        );

        Ok(out.into_bytes())
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn file_extension(&self) -> &'static str {
        "txt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> PrescriptionDocument {
        PrescriptionDocument {
            clinic_name: "MedCare Clinic".to_string(),
            prescription_id: "42".to_string(),
            issued_on: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            practitioner_name: "Dr. Jane Doe".to_string(),
            specialty: "cardiology".to_string(),
            patient_name: "John Smith".to_string(),
            patient_last_name: "Smith".to_string(),
            patient_email: "john.smith@example.com".to_string(),
            patient_phone: "+15550000000".to_string(),
            medicines: vec![MedicineLine {
                name: "Amoxicillin 500mg".to_string(),
                dosage: "1 tablet".to_string(),
                frequency: "Twice daily".to_string(),
                duration: "7 days".to_string(),
            }],
            notes: Some("Take with food.".to_string()),
        }
    }

    #[test]
    fn test_plain_text_rendering_contains_all_sections() {
        let rendered = PlainTextRenderer.render(&sample_document()).unwrap();
        let text = String::from_utf8(rendered).unwrap();

        assert!(text.contains("MedCare Clinic"));
        assert!(text.contains("MEDICAL PRESCRIPTION"));
        assert!(text.contains("Amoxicillin 500mg"));
        assert!(text.contains("Twice daily"));
        assert!(text.contains("Take with food."));
        assert!(text.contains("June 10, 2024"));
        assert!(text.contains("Doctor Signature"));
    }

    #[test]
    fn test_suggested_filename() {
        let document = sample_document();
        assert_eq!(
            document.suggested_filename(PlainTextRenderer.file_extension()),
            "prescription_42_Smith.txt"
        );
    }
}
