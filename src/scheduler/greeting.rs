use crate::models::FollowUpDetails;

/// Salutation for the local hour of day.
pub fn greeting_for_hour(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good morning",
        12..=16 => "Good afternoon",
        17..=20 => "Good evening",
        _ => "Hello",
    }
}

/// First message of a scheduled follow-up.
pub fn compose_follow_up_message(details: &FollowUpDetails, hour: u32) -> String {
    format!(
        "{} {}, this is your virtual health assistant for Dr. {} from {}. Just checking in after your recent visit for {}. How are you feeling today?",
        greeting_for_hour(hour),
        details.patient.first_name(),
        details.doctor.name,
        details.organization.name,
        details.follow_up.visit_summary,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Doctor, FollowUp, Organization, Patient, PreferredContactMethod};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn hour_buckets() {
        assert_eq!(greeting_for_hour(4), "Hello");
        assert_eq!(greeting_for_hour(5), "Good morning");
        assert_eq!(greeting_for_hour(11), "Good morning");
        assert_eq!(greeting_for_hour(12), "Good afternoon");
        assert_eq!(greeting_for_hour(16), "Good afternoon");
        assert_eq!(greeting_for_hour(17), "Good evening");
        assert_eq!(greeting_for_hour(20), "Good evening");
        assert_eq!(greeting_for_hour(21), "Hello");
        assert_eq!(greeting_for_hour(0), "Hello");
    }

    #[test]
    fn message_names_everyone_involved() {
        let org = Organization {
            id: Uuid::new_v4(),
            name: "Riverside Clinic".into(),
        };
        let doctor = Doctor {
            id: Uuid::new_v4(),
            organization_id: org.id,
            name: "Okafor".into(),
            email: "okafor@example.org".into(),
        };
        let patient = Patient {
            id: Uuid::new_v4(),
            doctor_id: doctor.id,
            name: "Maria Lopez".into(),
            phone: "+15551234567".into(),
            preferred_contact_method: PreferredContactMethod::Whatsapp,
            age: 52,
            gender: "female".into(),
            blood_type: "A+".into(),
            known_conditions: vec![],
            allergies: vec![],
            medications: vec![],
            created_at: Utc::now(),
        };
        let follow_up = FollowUp {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            doctor_id: doctor.id,
            scheduled_at: Utc::now(),
            completed_at: None,
            visit_summary: "blood pressure review".into(),
            diagnosis: "hypertension".into(),
            prescription: "amlodipine".into(),
            doctor_notes: String::new(),
            notes: String::new(),
            critical_flag: false,
            created_at: Utc::now(),
        };
        let details = FollowUpDetails {
            follow_up,
            patient,
            doctor,
            organization: org,
        };

        assert_eq!(
            compose_follow_up_message(&details, 9),
            "Good morning Maria, this is your virtual health assistant for Dr. Okafor from Riverside Clinic. Just checking in after your recent visit for blood pressure review. How are you feeling today?"
        );
    }
}
